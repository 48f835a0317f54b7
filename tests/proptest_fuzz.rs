// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Property-based tests for the in-process fallback store.
//!
//! Uses proptest to check the fallback against simple models of the remote
//! store's semantics, and to verify it never panics on odd inputs.
//!
//! Run with: `cargo test --test proptest_fuzz`

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;

use resilient_store::storage::pattern::glob_match;
use resilient_store::{FallbackStore, StoreError};

// =============================================================================
// Strategies for generating test data
// =============================================================================

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,6}(:[a-z0-9]{1,6}){0,3}"
}

/// Reference `LRANGE`: inclusive, negative indices from the end, clamped.
fn model_lrange(list: &[String], start: i64, stop: i64) -> Vec<String> {
    let len = list.len() as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return Vec::new();
    }
    list[start as usize..=stop as usize].to_vec()
}

#[derive(Debug, Clone)]
enum Op {
    Set(String, String),
    Del(String),
    Hset(String, String, String),
    Sadd(String, String),
    Rpush(String, String),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let key = "[abc]";
    prop_oneof![
        (key, "[a-z]{0,4}").prop_map(|(k, v)| Op::Set(k, v)),
        key.prop_map(Op::Del),
        (key, "[xy]", "[a-z]{0,4}").prop_map(|(k, f, v)| Op::Hset(k, f, v)),
        (key, "[a-z]{1,3}").prop_map(|(k, m)| Op::Sadd(k, m)),
        (key, "[a-z]{1,3}").prop_map(|(k, v)| Op::Rpush(k, v)),
    ]
}

// =============================================================================
// Model-Checked Properties
// =============================================================================

proptest! {
    /// set then get returns the value
    #[test]
    fn prop_set_then_get(key in key_strategy(), value in ".*") {
        let store = FallbackStore::new();
        store.set(&key, &value, None);
        prop_assert_eq!(store.get(&key).unwrap(), Some(value));
    }

    /// lrange agrees with the reference on any index pair
    #[test]
    fn prop_lrange_matches_model(
        values in prop::collection::vec("[a-z]{1,4}", 0..20),
        start in -25i64..25,
        stop in -25i64..25,
    ) {
        let store = FallbackStore::new();
        for v in &values {
            store.rpush("list", &[v.as_str()]).unwrap();
        }
        let got = store.lrange("list", start, stop).unwrap();
        prop_assert_eq!(got, model_lrange(&values, start, stop));
    }

    /// lpush of several values reverses them at the head
    #[test]
    fn prop_lpush_reverses(values in prop::collection::vec("[a-z]{1,4}", 1..10)) {
        let store = FallbackStore::new();
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        prop_assert_eq!(store.lpush("list", &refs).unwrap(), values.len() as u64);

        let mut expected = values.clone();
        expected.reverse();
        prop_assert_eq!(store.lrange("list", 0, -1).unwrap(), expected);
    }

    /// sadd counts only members not already present
    #[test]
    fn prop_sadd_counts_new_members(batches in prop::collection::vec(
        prop::collection::vec("[a-e]", 1..5), 1..6)
    ) {
        let store = FallbackStore::new();
        let mut model: HashSet<String> = HashSet::new();

        for batch in &batches {
            let refs: Vec<&str> = batch.iter().map(String::as_str).collect();
            let fresh = batch.iter().filter(|m| model.insert((*m).clone())).count();
            prop_assert_eq!(store.sadd("set", &refs).unwrap(), fresh as u64);
        }

        let members: HashSet<String> = store.smembers("set").unwrap().into_iter().collect();
        prop_assert_eq!(members, model);
    }

    /// A key never holds two types; misuse is rejected, never merged
    #[test]
    fn prop_one_type_per_key(ops in prop::collection::vec(op_strategy(), 1..40)) {
        #[derive(Clone, Copy, PartialEq, Debug)]
        enum Kind { Str, Hash, Set, List }

        let store = FallbackStore::new();
        let mut kinds: HashMap<String, Kind> = HashMap::new();

        for op in ops {
            let (key, kind, result) = match &op {
                Op::Set(k, v) => {
                    store.set(k, v, None);
                    kinds.insert(k.clone(), Kind::Str);
                    continue;
                }
                Op::Del(k) => {
                    store.del(&[k.as_str()]);
                    kinds.remove(k);
                    continue;
                }
                Op::Hset(k, f, v) => (k, Kind::Hash, store.hset(k, f, v).map(|_| ())),
                Op::Sadd(k, m) => (k, Kind::Set, store.sadd(k, &[m.as_str()]).map(|_| ())),
                Op::Rpush(k, v) => (k, Kind::List, store.rpush(k, &[v.as_str()]).map(|_| ())),
            };

            match kinds.get(key.as_str()).copied() {
                Some(existing) if existing != kind => {
                    prop_assert_eq!(result, Err(StoreError::WrongType));
                }
                _ => {
                    prop_assert!(result.is_ok());
                    kinds.insert(key.clone(), kind);
                }
            }
        }

        let mut expected: Vec<String> = kinds.into_keys().collect();
        expected.sort();
        prop_assert_eq!(store.keys("*"), expected);
    }

    /// incr_by agrees with checked integer addition
    #[test]
    fn prop_incr_by_matches_checked_add(start in any::<i64>(), delta in any::<i64>()) {
        let store = FallbackStore::new();
        store.set("n", &start.to_string(), None);
        match start.checked_add(delta) {
            Some(sum) => {
                prop_assert_eq!(store.incr_by("n", delta).unwrap(), sum);
            }
            None => {
                prop_assert!(matches!(store.incr_by("n", delta), Err(StoreError::NotInteger(_))));
            }
        }
    }
}

// =============================================================================
// Glob Pattern Fuzz Tests
// =============================================================================

proptest! {
    /// A pattern without metacharacters matches exactly itself
    #[test]
    fn fuzz_literal_pattern_matches_only_itself(a in "[a-z:]{0,12}", b in "[a-z:]{0,12}") {
        prop_assert!(glob_match(&a, &a));
        prop_assert_eq!(glob_match(&a, &b), a == b);
    }

    /// `*` matches everything, `prefix*` matches exactly the keys with that prefix
    #[test]
    fn fuzz_star_prefix(prefix in "[a-z]{0,5}", key in "[a-z]{0,10}") {
        prop_assert!(glob_match("*", &key));
        let pattern = format!("{}*", prefix);
        prop_assert_eq!(glob_match(&pattern, &key), key.starts_with(&prefix));
    }

    /// Arbitrary patterns and keys never panic
    #[test]
    fn fuzz_glob_never_panics(pattern in ".{0,20}", key in ".{0,20}") {
        let _ = glob_match(&pattern, &key);
    }
}
