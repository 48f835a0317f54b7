// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Emulated operations: strings, hashes, lists, sets and key queries.
//!
//! Each of these has the same contract on both paths, so callers get a result
//! whether or not the remote is reachable. Only caller bugs (`WrongType`,
//! `NotInteger`, `InvalidArgument`) come back as errors.

use std::collections::HashMap;
use std::time::Duration;

use crate::storage::traits::StoreError;

use super::{ResilientStore, Served};

/// Longest expiry accepted, in seconds. The remote store rejects timeouts whose
/// millisecond deadline overflows a signed 64-bit integer.
pub const MAX_EXPIRY_SECS: i64 = i64::MAX / 1000 / 2;

impl ResilientStore {
    // ═══════════════════════════════════════════════════════════════════════════
    // Strings
    // ═══════════════════════════════════════════════════════════════════════════

    pub async fn get(&self, key: &str) -> Result<Served<Option<String>>, StoreError> {
        self.route("get", |c| async move { c.get(key).await }, |f| f.get(key))
            .await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<Served<()>, StoreError> {
        self.route(
            "set",
            |c| async move { c.set(key, value).await },
            |f| {
                f.set(key, value, None);
                Ok(())
            },
        )
        .await
    }

    /// Set a value that expires after `ttl_secs` seconds.
    ///
    /// Zero and anything above [`MAX_EXPIRY_SECS`] are rejected.
    pub async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl_secs: u64,
    ) -> Result<Served<()>, StoreError> {
        if ttl_secs == 0 {
            return Err(StoreError::InvalidArgument(
                "expiry must be at least one second".into(),
            ));
        }
        if ttl_secs > MAX_EXPIRY_SECS as u64 {
            return Err(StoreError::InvalidArgument(format!(
                "expiry of {} seconds is out of range",
                ttl_secs
            )));
        }
        self.route(
            "set_with_expiry",
            |c| async move { c.set_with_expiry(key, value, ttl_secs).await },
            |f| {
                f.set(key, value, Some(Duration::from_secs(ttl_secs)));
                Ok(())
            },
        )
        .await
    }

    /// Delete keys of any type. Returns how many existed.
    pub async fn delete(&self, keys: &[&str]) -> Result<Served<u64>, StoreError> {
        self.route("delete", |c| async move { c.del(keys).await }, |f| Ok(f.del(keys)))
            .await
    }

    /// Count how many of `keys` exist. Repeated keys count each time.
    pub async fn exists(&self, keys: &[&str]) -> Result<Served<u64>, StoreError> {
        self.route("exists", |c| async move { c.exists(keys).await }, |f| Ok(f.exists(keys)))
            .await
    }

    /// Set a key's time to live. False if the key doesn't exist.
    pub async fn expire(&self, key: &str, seconds: i64) -> Result<Served<bool>, StoreError> {
        if seconds > MAX_EXPIRY_SECS {
            return Err(StoreError::InvalidArgument(format!(
                "expiry of {} seconds is out of range",
                seconds
            )));
        }
        self.route(
            "expire",
            |c| async move { c.expire(key, seconds).await },
            |f| Ok(f.expire(key, seconds)),
        )
        .await
    }

    /// Seconds left, `-1` for no expiry, `-2` for a missing key.
    pub async fn ttl(&self, key: &str) -> Result<Served<i64>, StoreError> {
        self.route("ttl", |c| async move { c.ttl(key).await }, |f| Ok(f.ttl(key)))
            .await
    }

    pub async fn increment(&self, key: &str) -> Result<Served<i64>, StoreError> {
        self.increment_by(key, 1).await
    }

    /// Add `delta` to an integer value; a missing key counts as zero.
    pub async fn increment_by(&self, key: &str, delta: i64) -> Result<Served<i64>, StoreError> {
        self.route(
            "increment_by",
            |c| async move { c.incr_by(key, delta).await },
            |f| f.incr_by(key, delta),
        )
        .await
    }

    /// Key names matching a glob pattern (`*`, `?`, `[...]`), sorted.
    ///
    /// Only the path that serves the call is searched.
    pub async fn keys(&self, pattern: &str) -> Result<Served<Vec<String>>, StoreError> {
        self.route("keys", |c| async move { c.keys(pattern).await }, |f| Ok(f.keys(pattern)))
            .await
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Hashes
    // ═══════════════════════════════════════════════════════════════════════════

    /// Set one field. True if the field is new.
    pub async fn hset(&self, key: &str, field: &str, value: &str) -> Result<Served<bool>, StoreError> {
        self.route(
            "hset",
            |c| async move { c.hset(key, field, value).await },
            |f| f.hset(key, field, value),
        )
        .await
    }

    pub async fn hget(&self, key: &str, field: &str) -> Result<Served<Option<String>>, StoreError> {
        self.route(
            "hget",
            |c| async move { c.hget(key, field).await },
            |f| f.hget(key, field),
        )
        .await
    }

    pub async fn hget_all(&self, key: &str) -> Result<Served<HashMap<String, String>>, StoreError> {
        self.route("hget_all", |c| async move { c.hget_all(key).await }, |f| f.hget_all(key))
            .await
    }

    pub async fn hmset(&self, key: &str, fields: &[(&str, &str)]) -> Result<Served<()>, StoreError> {
        if fields.is_empty() {
            return Err(StoreError::InvalidArgument("hmset needs at least one field".into()));
        }
        self.route(
            "hmset",
            |c| async move { c.hmset(key, fields).await },
            |f| f.hmset(key, fields),
        )
        .await
    }

    pub async fn hdel(&self, key: &str, fields: &[&str]) -> Result<Served<u64>, StoreError> {
        self.route(
            "hdel",
            |c| async move { c.hdel(key, fields).await },
            |f| f.hdel(key, fields),
        )
        .await
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Lists
    // ═══════════════════════════════════════════════════════════════════════════

    /// Push to the head, one value at a time: `lpush(k, [a, b])` leaves `b` first.
    pub async fn lpush(&self, key: &str, values: &[&str]) -> Result<Served<u64>, StoreError> {
        if values.is_empty() {
            return Err(StoreError::InvalidArgument("lpush needs at least one value".into()));
        }
        self.route(
            "lpush",
            |c| async move { c.lpush(key, values).await },
            |f| f.lpush(key, values),
        )
        .await
    }

    pub async fn rpush(&self, key: &str, values: &[&str]) -> Result<Served<u64>, StoreError> {
        if values.is_empty() {
            return Err(StoreError::InvalidArgument("rpush needs at least one value".into()));
        }
        self.route(
            "rpush",
            |c| async move { c.rpush(key, values).await },
            |f| f.rpush(key, values),
        )
        .await
    }

    /// Inclusive range; negative indices count from the end.
    pub async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Served<Vec<String>>, StoreError> {
        self.route(
            "lrange",
            |c| async move { c.lrange(key, start, stop).await },
            |f| f.lrange(key, start, stop),
        )
        .await
    }

    pub async fn llen(&self, key: &str) -> Result<Served<u64>, StoreError> {
        self.route("llen", |c| async move { c.llen(key).await }, |f| f.llen(key))
            .await
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Sets
    // ═══════════════════════════════════════════════════════════════════════════

    /// Add members. Returns how many were not already present.
    pub async fn sadd(&self, key: &str, members: &[&str]) -> Result<Served<u64>, StoreError> {
        if members.is_empty() {
            return Err(StoreError::InvalidArgument("sadd needs at least one member".into()));
        }
        self.route(
            "sadd",
            |c| async move { c.sadd(key, members).await },
            |f| f.sadd(key, members),
        )
        .await
    }

    pub async fn srem(&self, key: &str, members: &[&str]) -> Result<Served<u64>, StoreError> {
        self.route(
            "srem",
            |c| async move { c.srem(key, members).await },
            |f| f.srem(key, members),
        )
        .await
    }

    pub async fn sismember(&self, key: &str, member: &str) -> Result<Served<bool>, StoreError> {
        self.route(
            "sismember",
            |c| async move { c.sismember(key, member).await },
            |f| f.sismember(key, member),
        )
        .await
    }

    /// All members, in no particular order.
    pub async fn smembers(&self, key: &str) -> Result<Served<Vec<String>>, StoreError> {
        self.route("smembers", |c| async move { c.smembers(key).await }, |f| f.smembers(key))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::fake_store;
    use crate::storage::traits::StoreError;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_set_with_zero_expiry_rejected() {
        let (store, connector) = fake_store(true);
        let err = store.set_with_expiry("k", "v", 0).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
        // Rejected before any path is tried
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_out_of_range_expiry_rejected_on_both_paths() {
        for up in [true, false] {
            let (store, connector) = fake_store(up);
            store.set("k", "v").await.unwrap();
            let before = connector.attempts.load(Ordering::SeqCst);

            let err = store.set_with_expiry("k", "v", u64::MAX).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidArgument(_)));
            let err = store.expire("k", i64::MAX).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidArgument(_)));
            assert_eq!(connector.attempts.load(Ordering::SeqCst), before);

            // The largest accepted expiry still works
            store.set_with_expiry("k", "v", super::MAX_EXPIRY_SECS as u64).await.unwrap();
            assert!(*store.expire("k", super::MAX_EXPIRY_SECS).await.unwrap());
            assert_eq!(store.get("k").await.unwrap().into_inner().as_deref(), Some("v"));
        }
    }

    #[tokio::test]
    async fn test_ttl_sentinels_on_fallback() {
        let (store, _) = fake_store(false);
        assert_eq!(*store.ttl("missing").await.unwrap(), -2);
        store.set("plain", "v").await.unwrap();
        assert_eq!(*store.ttl("plain").await.unwrap(), -1);
        store.set_with_expiry("temp", "v", 30).await.unwrap();
        let ttl = *store.ttl("temp").await.unwrap();
        assert!(ttl > 0 && ttl <= 30);
    }

    #[tokio::test]
    async fn test_increment_on_both_paths() {
        for up in [true, false] {
            let (store, _) = fake_store(up);
            assert_eq!(*store.increment("n").await.unwrap(), 1);
            assert_eq!(*store.increment_by("n", 9).await.unwrap(), 10);
            assert_eq!(*store.increment_by("n", -15).await.unwrap(), -5);
        }
    }

    #[tokio::test]
    async fn test_increment_non_integer_propagates() {
        let (store, _) = fake_store(false);
        store.set("word", "hello").await.unwrap();
        let err = store.increment("word").await.unwrap_err();
        assert!(matches!(err, StoreError::NotInteger(_)));
    }

    #[tokio::test]
    async fn test_wrong_type_from_fallback_propagates() {
        let (store, _) = fake_store(false);
        store.rpush("list", &["a"]).await.unwrap();
        assert_eq!(store.hget("list", "f").await, Err(StoreError::WrongType));
        assert_eq!(store.sadd("list", &["m"]).await, Err(StoreError::WrongType));
    }

    #[tokio::test]
    async fn test_hash_ops() {
        let (store, _) = fake_store(false);
        assert!(*store.hset("h", "a", "1").await.unwrap());
        assert!(!*store.hset("h", "a", "2").await.unwrap());
        store.hmset("h", &[("b", "3"), ("c", "4")]).await.unwrap();

        let all = store.hget_all("h").await.unwrap().into_inner();
        assert_eq!(all.len(), 3);
        assert_eq!(all.get("a").map(String::as_str), Some("2"));

        assert_eq!(*store.hdel("h", &["a", "zzz"]).await.unwrap(), 1);
        assert_eq!(store.hget("h", "a").await.unwrap().into_inner(), None);
    }

    #[tokio::test]
    async fn test_list_push_order() {
        let (store, _) = fake_store(false);
        assert_eq!(*store.lpush("l", &["a", "b"]).await.unwrap(), 2);
        assert_eq!(*store.rpush("l", &["c"]).await.unwrap(), 3);
        assert_eq!(store.lrange("l", 0, -1).await.unwrap().into_inner(), vec!["b", "a", "c"]);
        assert_eq!(*store.llen("l").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_empty_push_rejected() {
        let (store, _) = fake_store(false);
        assert!(matches!(store.rpush("l", &[]).await, Err(StoreError::InvalidArgument(_))));
        assert!(matches!(store.sadd("s", &[]).await, Err(StoreError::InvalidArgument(_))));
        assert!(matches!(store.hmset("h", &[]).await, Err(StoreError::InvalidArgument(_))));
        assert_eq!(*store.exists(&["h"]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_membership() {
        let (store, _) = fake_store(true);
        assert_eq!(*store.sadd("s", &["x", "y", "x"]).await.unwrap(), 2);
        assert!(*store.sismember("s", "x").await.unwrap());
        assert_eq!(*store.srem("s", &["x"]).await.unwrap(), 1);
        assert_eq!(store.smembers("s").await.unwrap().into_inner(), vec!["y"]);
    }

    #[tokio::test]
    async fn test_delete_and_exists_across_types() {
        let (store, _) = fake_store(false);
        store.set("a", "1").await.unwrap();
        store.hset("b", "f", "v").await.unwrap();
        store.sadd("c", &["m"]).await.unwrap();

        assert_eq!(*store.exists(&["a", "b", "c", "d", "a"]).await.unwrap(), 4);
        assert_eq!(*store.delete(&["a", "b", "d"]).await.unwrap(), 2);
        assert_eq!(store.keys("*").await.unwrap().into_inner(), vec!["c"]);
    }
}
