//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the store's invariants over arbitrary operation
//! sequences. Expiry is driven by a manual clock, so no test sleeps.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheStore, ManualClock};

// == Test Configuration ==
const TEST_MAX_SIZE: usize = 100;
const TEST_DEFAULT_TTL: i64 = 300;

fn new_store(max_size: usize) -> (CacheStore<String>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_now());
    let store = CacheStore::new(max_size, TEST_DEFAULT_TTL, clock.clone()).unwrap();
    (store, clock)
}

// == Strategies ==
/// Generates cache keys in the `<system>:<operation>:<arg>` style
fn key_strategy() -> impl Strategy<Value = String> {
    ("(svc|nt|intune|sn)", "[a-z]{1,8}", "[a-zA-Z0-9_]{1,16}")
        .prop_map(|(system, op, arg)| format!("{system}:{op}:{arg}"))
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,64}"
}

/// Generates TTLs across the whole `i64` range, weighted toward the extremes
fn ttl_strategy() -> impl Strategy<Value = i64> {
    prop_oneof![
        -10i64..10_000,
        any::<i64>(),
        (i64::MAX - 1_000)..=i64::MAX,
        i64::MIN..=(i64::MIN + 1_000),
        9_000_000_000_000i64..10_000_000_000_000_000,
    ]
}

/// Generates a sequence of cache operations for testing
#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Delete { key: String },
    Advance { secs: u64 },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Delete { key }),
        (0u64..400).prop_map(|secs| CacheOp::Advance { secs }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Hits and misses reported by stats match what `get` actually returned.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let (mut store, clock) = new_store(TEST_MAX_SIZE);
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;
        let mut expected_sets: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    store.set(key, value, None);
                    expected_sets += 1;
                }
                CacheOp::Get { key } => match store.get(&key) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                CacheOp::Delete { key } => {
                    store.delete(&key);
                }
                CacheOp::Advance { secs } => clock.advance(Duration::from_secs(secs)),
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.total_sets, expected_sets, "Sets mismatch");
        prop_assert_eq!(stats.size, store.len(), "Size mismatch");
    }

    // Storing a pair and reading it back before expiry returns the same value.
    #[test]
    fn prop_roundtrip_storage(
        key in key_strategy(),
        value in value_strategy(),
        ttl in 1i64..10_000
    ) {
        let (mut store, _) = new_store(TEST_MAX_SIZE);

        store.set(key.clone(), value.clone(), Some(ttl));

        prop_assert_eq!(store.get(&key), Some(value));
    }

    // Any TTL is accepted: positive ones are readable right away, the rest
    // are stored already expired.
    #[test]
    fn prop_any_ttl_is_accepted(
        key in key_strategy(),
        value in value_strategy(),
        ttl in ttl_strategy()
    ) {
        let (mut store, clock) = new_store(TEST_MAX_SIZE);

        store.set(key.clone(), value.clone(), Some(ttl));

        if ttl > 0 {
            prop_assert_eq!(store.get(&key), Some(value));
            prop_assert!(store.ttl_remaining(&key).unwrap_or(0) > 0);
        } else {
            prop_assert!(store.get(&key).is_none());
        }

        clock.advance(Duration::from_secs(3600));
        let expected_live = ttl > 3600;
        prop_assert_eq!(store.contains(&key), expected_live);
        prop_assert_eq!(store.sweep_expired(), usize::from(!expected_live && ttl > 0));
    }

    // Once the TTL has elapsed the entry is gone and the read counts as a miss.
    #[test]
    fn prop_ttl_expiration_behavior(
        key in key_strategy(),
        value in value_strategy(),
        ttl in 1u64..3600,
        extra in 0u64..100
    ) {
        let (mut store, clock) = new_store(TEST_MAX_SIZE);

        store.set(key.clone(), value, Some(ttl as i64));
        clock.advance(Duration::from_secs(ttl + extra));

        prop_assert!(store.get(&key).is_none());
        let stats = store.stats();
        prop_assert_eq!(stats.hits, 0);
        prop_assert_eq!(stats.misses, 1);
    }

    // Overwriting keeps exactly one entry holding the latest value.
    #[test]
    fn prop_overwrite_semantics(
        key in key_strategy(),
        value1 in value_strategy(),
        value2 in value_strategy()
    ) {
        let (mut store, _) = new_store(TEST_MAX_SIZE);

        store.set(key.clone(), value1, None);
        store.set(key.clone(), value2.clone(), None);

        prop_assert_eq!(store.get(&key), Some(value2));
        prop_assert_eq!(store.len(), 1);
    }

    // Size never exceeds capacity, and overflowing records evictions.
    #[test]
    fn prop_capacity_enforcement(
        keys in prop::collection::hash_set(key_strategy(), 1..200)
    ) {
        let max_size = 50;
        let (mut store, _) = new_store(max_size);
        let distinct = keys.len();

        for key in keys {
            store.set(key, "v".to_string(), None);
            prop_assert!(
                store.len() <= max_size,
                "Cache size {} exceeds max {}",
                store.len(),
                max_size
            );
        }

        if distinct > max_size {
            prop_assert!(store.stats().evictions >= 1);
        } else {
            prop_assert_eq!(store.stats().evictions, 0);
        }
    }

    // Eviction always removes the earliest inserted keys first.
    #[test]
    fn prop_eviction_follows_creation_order(
        keys in prop::collection::vec(key_strategy(), 11..40)
    ) {
        let mut seen = HashSet::new();
        let unique: Vec<String> = keys.into_iter().filter(|k| seen.insert(k.clone())).collect();
        prop_assume!(unique.len() > 10);

        let (mut store, clock) = new_store(10);
        for key in &unique[..10] {
            store.set(key.clone(), "v".to_string(), None);
            clock.advance(Duration::from_millis(1));
        }

        store.set(unique[10].clone(), "v".to_string(), None);

        prop_assert!(!store.contains(&unique[0]), "First inserted key should be evicted");
        for key in &unique[1..=10] {
            prop_assert!(store.contains(key), "Key {} should survive", key);
        }
    }

    // Pattern delete removes exactly the keys containing the substring.
    #[test]
    fn prop_delete_by_pattern_exact(
        keys in prop::collection::hash_set(key_strategy(), 1..60)
    ) {
        let (mut store, _) = new_store(TEST_MAX_SIZE);
        for key in &keys {
            store.set(key.clone(), "v".to_string(), None);
        }
        let expected_removed = keys.iter().filter(|k| k.contains("svc:")).count();

        let removed = store.delete_by_pattern("svc:");

        prop_assert_eq!(removed, expected_removed);
        for key in &keys {
            prop_assert_eq!(store.contains(key), !key.contains("svc:"));
        }
    }

    // A sweep removes every expired entry and nothing live.
    #[test]
    fn prop_sweep_removes_only_expired(
        ttls in prop::collection::vec(1i64..100, 1..50),
        elapsed in 0u64..120
    ) {
        let (mut store, clock) = new_store(TEST_MAX_SIZE);
        for (i, ttl) in ttls.iter().enumerate() {
            store.set(format!("k{i}"), "v".to_string(), Some(*ttl));
        }

        clock.advance(Duration::from_secs(elapsed));
        let expected_expired = ttls.iter().filter(|ttl| **ttl as u64 <= elapsed).count();

        prop_assert_eq!(store.sweep_expired(), expected_expired);
        prop_assert_eq!(store.len(), ttls.len() - expected_expired);
    }
}
