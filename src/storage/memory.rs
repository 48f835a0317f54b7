// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-process fallback store.
//!
//! Emulates the subset of remote data types the façade serves when the remote
//! store is unusable: expiring strings, hashes, lists and sets, all in one key
//! namespace behind a single mutex. Nothing here is persisted or visible to other
//! processes.
//!
//! Expiry is lazy: an entry past its deadline is treated as absent and removed
//! the next time anything touches it. There is no background sweep.

use std::collections::hash_map::Entry as MapEntry;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::pattern::glob_match;
use super::traits::StoreError;

#[derive(Debug)]
enum Data {
    String(String),
    Hash(HashMap<String, String>),
    List(VecDeque<String>),
    Set(HashSet<String>),
}

#[derive(Debug)]
struct Entry {
    data: Data,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(data: Data) -> Self {
        Self { data, expires_at: None }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// Deadline `ttl` from now. One past what `Instant` can hold never arrives.
fn deadline_after(ttl: Duration) -> Option<Instant> {
    Instant::now().checked_add(ttl)
}

/// Look up a live entry, dropping it first if it has expired.
fn live<'a>(data: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
    let now = Instant::now();
    if data.get(key).is_some_and(|e| e.is_expired(now)) {
        data.remove(key);
        return None;
    }
    data.get_mut(key)
}

/// Get the live entry for `key`, creating it with `init` when absent or expired.
fn live_or_insert<'a>(
    data: &'a mut HashMap<String, Entry>,
    key: &str,
    init: impl FnOnce() -> Data,
) -> &'a mut Entry {
    let now = Instant::now();
    match data.entry(key.to_string()) {
        MapEntry::Occupied(slot) => {
            let entry = slot.into_mut();
            if entry.is_expired(now) {
                *entry = Entry::new(init());
            }
            entry
        }
        MapEntry::Vacant(slot) => slot.insert(Entry::new(init())),
    }
}

/// Resolve a possibly negative index range against a sequence of `len` items.
///
/// Follows the remote store's convention: `-1` is the last element, out of range
/// bounds are clamped, and an empty range yields `None`.
fn normalize_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

pub struct FallbackStore {
    data: Mutex<HashMap<String, Entry>>,
}

impl FallbackStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }

    /// Number of keys held, including any not yet lazily expired.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }

    /// Drop every key of every type.
    pub fn flush_all(&self) {
        self.data.lock().clear();
    }

    // ── Strings ────────────────────────────────────────────────────────────

    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut data = self.data.lock();
        match live(&mut data, key) {
            Some(Entry { data: Data::String(value), .. }) => Ok(Some(value.clone())),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(None),
        }
    }

    /// Store a string, replacing whatever the key held. Clears any previous expiry.
    pub fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let entry = Entry {
            data: Data::String(value.to_string()),
            expires_at: ttl.and_then(deadline_after),
        };
        self.data.lock().insert(key.to_string(), entry);
    }

    pub fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let mut data = self.data.lock();
        let entry = live_or_insert(&mut data, key, || Data::String("0".to_string()));
        let Data::String(value) = &mut entry.data else {
            return Err(StoreError::WrongType);
        };
        let current: i64 = value
            .parse()
            .map_err(|_| StoreError::NotInteger(value.clone()))?;
        let next = current
            .checked_add(delta)
            .ok_or_else(|| StoreError::NotInteger("increment would overflow".to_string()))?;
        *value = next.to_string();
        Ok(next)
    }

    /// Set a key's time to live. Returns false if the key does not exist.
    ///
    /// A non-positive timeout deletes the key immediately, as on the remote.
    pub fn expire(&self, key: &str, seconds: i64) -> bool {
        let mut data = self.data.lock();
        if live(&mut data, key).is_none() {
            return false;
        }
        if seconds <= 0 {
            data.remove(key);
            return true;
        }
        if let Some(entry) = data.get_mut(key) {
            entry.expires_at = deadline_after(Duration::from_secs(seconds as u64));
        }
        true
    }

    /// Remaining time to live in seconds, `-1` without expiry, `-2` if absent.
    pub fn ttl(&self, key: &str) -> i64 {
        let mut data = self.data.lock();
        match live(&mut data, key) {
            None => -2,
            Some(Entry { expires_at: None, .. }) => -1,
            Some(Entry { expires_at: Some(deadline), .. }) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                ((remaining.as_millis() + 500) / 1000) as i64
            }
        }
    }

    // ── Keyspace ───────────────────────────────────────────────────────────

    /// Count how many of `keys` exist. A key named twice counts twice.
    pub fn exists(&self, keys: &[&str]) -> u64 {
        let mut data = self.data.lock();
        keys.iter()
            .filter(|key| live(&mut data, key).is_some())
            .count() as u64
    }

    /// Remove `keys` of any type. Returns how many were removed.
    pub fn del(&self, keys: &[&str]) -> u64 {
        let mut data = self.data.lock();
        let now = Instant::now();
        keys.iter()
            .filter_map(|key| data.remove(*key))
            .filter(|entry| !entry.is_expired(now))
            .count() as u64
    }

    /// Live keys matching a glob pattern, sorted.
    pub fn keys(&self, pattern: &str) -> Vec<String> {
        let mut data = self.data.lock();
        let now = Instant::now();
        data.retain(|_, entry| !entry.is_expired(now));
        let mut keys: Vec<String> = data
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();
        keys.sort_unstable();
        keys
    }

    // ── Hashes ─────────────────────────────────────────────────────────────

    /// Returns true if the field is new.
    pub fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError> {
        let mut data = self.data.lock();
        let entry = live_or_insert(&mut data, key, || Data::Hash(HashMap::new()));
        let Data::Hash(fields) = &mut entry.data else {
            return Err(StoreError::WrongType);
        };
        Ok(fields.insert(field.to_string(), value.to_string()).is_none())
    }

    pub fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut data = self.data.lock();
        match live(&mut data, key) {
            Some(Entry { data: Data::Hash(fields), .. }) => Ok(fields.get(field).cloned()),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(None),
        }
    }

    pub fn hget_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut data = self.data.lock();
        match live(&mut data, key) {
            Some(Entry { data: Data::Hash(fields), .. }) => Ok(fields.clone()),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(HashMap::new()),
        }
    }

    /// Set several fields. An empty `fields` leaves the key untouched.
    pub fn hmset(&self, key: &str, fields: &[(&str, &str)]) -> Result<(), StoreError> {
        let mut data = self.data.lock();
        if fields.is_empty() {
            return match live(&mut data, key) {
                Some(Entry { data: Data::Hash(_), .. }) | None => Ok(()),
                Some(_) => Err(StoreError::WrongType),
            };
        }
        let entry = live_or_insert(&mut data, key, || Data::Hash(HashMap::new()));
        let Data::Hash(map) = &mut entry.data else {
            return Err(StoreError::WrongType);
        };
        for (field, value) in fields {
            map.insert((*field).to_string(), (*value).to_string());
        }
        Ok(())
    }

    /// Remove fields; the key goes away with its last field.
    pub fn hdel(&self, key: &str, fields: &[&str]) -> Result<u64, StoreError> {
        let mut data = self.data.lock();
        let (removed, now_empty) = match live(&mut data, key) {
            Some(Entry { data: Data::Hash(map), .. }) => {
                let removed = fields.iter().filter(|f| map.remove(**f).is_some()).count();
                (removed as u64, map.is_empty())
            }
            Some(_) => return Err(StoreError::WrongType),
            None => return Ok(0),
        };
        if now_empty {
            data.remove(key);
        }
        Ok(removed)
    }

    // ── Lists ──────────────────────────────────────────────────────────────

    /// Push each value to the head in turn, so the last value ends up first.
    pub fn lpush(&self, key: &str, values: &[&str]) -> Result<u64, StoreError> {
        let mut data = self.data.lock();
        let entry = live_or_insert(&mut data, key, || Data::List(VecDeque::new()));
        let Data::List(list) = &mut entry.data else {
            return Err(StoreError::WrongType);
        };
        for value in values {
            list.push_front((*value).to_string());
        }
        Ok(list.len() as u64)
    }

    pub fn rpush(&self, key: &str, values: &[&str]) -> Result<u64, StoreError> {
        let mut data = self.data.lock();
        let entry = live_or_insert(&mut data, key, || Data::List(VecDeque::new()));
        let Data::List(list) = &mut entry.data else {
            return Err(StoreError::WrongType);
        };
        list.extend(values.iter().map(|v| (*v).to_string()));
        Ok(list.len() as u64)
    }

    pub fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError> {
        let mut data = self.data.lock();
        match live(&mut data, key) {
            Some(Entry { data: Data::List(list), .. }) => Ok(normalize_range(list.len(), start, stop)
                .map(|(from, to)| list.range(from..=to).cloned().collect())
                .unwrap_or_default()),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(Vec::new()),
        }
    }

    pub fn llen(&self, key: &str) -> Result<u64, StoreError> {
        let mut data = self.data.lock();
        match live(&mut data, key) {
            Some(Entry { data: Data::List(list), .. }) => Ok(list.len() as u64),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(0),
        }
    }

    // ── Sets ───────────────────────────────────────────────────────────────

    /// Returns how many members were not already present.
    pub fn sadd(&self, key: &str, members: &[&str]) -> Result<u64, StoreError> {
        let mut data = self.data.lock();
        let entry = live_or_insert(&mut data, key, || Data::Set(HashSet::new()));
        let Data::Set(set) = &mut entry.data else {
            return Err(StoreError::WrongType);
        };
        Ok(members.iter().filter(|m| set.insert((**m).to_string())).count() as u64)
    }

    pub fn srem(&self, key: &str, members: &[&str]) -> Result<u64, StoreError> {
        let mut data = self.data.lock();
        let (removed, now_empty) = match live(&mut data, key) {
            Some(Entry { data: Data::Set(set), .. }) => {
                let removed = members.iter().filter(|m| set.remove(**m)).count();
                (removed as u64, set.is_empty())
            }
            Some(_) => return Err(StoreError::WrongType),
            None => return Ok(0),
        };
        if now_empty {
            data.remove(key);
        }
        Ok(removed)
    }

    pub fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut data = self.data.lock();
        match live(&mut data, key) {
            Some(Entry { data: Data::Set(set), .. }) => Ok(set.contains(member)),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(false),
        }
    }

    /// Members in no particular order.
    pub fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut data = self.data.lock();
        match live(&mut data, key) {
            Some(Entry { data: Data::Set(set), .. }) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(Vec::new()),
        }
    }
}

impl Default for FallbackStore {
    fn default() -> Self {
        Self::new()
    }
}
