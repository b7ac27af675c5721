//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the segmented cache against a plain map model.

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

use crate::cache::SegmentedCache;

// == Test Configuration ==
const TEST_MAX_SIZE: usize = 100;

// == Strategies ==
/// Generates cache keys from a small alphabet so that operations collide
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-h]{1,2}".prop_map(|s| s)
}

/// Generates a sequence of cache operations for testing
#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: u32 },
    Get { key: String },
    Peek { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), any::<u32>()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Peek { key }),
        key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // *For any* sequence of sets over exactly `max_size` distinct keys,
    // the size equals the number of distinct keys.
    #[test]
    fn prop_size_counts_distinct_keys(keys in prop::collection::vec(key_strategy(), 1..40)) {
        let distinct: HashSet<&String> = keys.iter().collect();
        let mut cache = SegmentedCache::new(distinct.len()).unwrap();

        for key in &keys {
            cache.set(key.clone(), 0u32);
        }

        prop_assert_eq!(cache.len(), distinct.len());
    }

    // *For any* sequence of operations, the size never exceeds `max_size`.
    #[test]
    fn prop_capacity_enforcement(
        max_size in 1usize..8,
        ops in prop::collection::vec(cache_op_strategy(), 1..200)
    ) {
        let mut cache = SegmentedCache::new(max_size).unwrap();

        for op in ops {
            match op {
                CacheOp::Set { key, value } => { cache.set(key, value); }
                CacheOp::Get { key } => { cache.get(&key); }
                CacheOp::Peek { key } => { cache.peek(&key); }
                CacheOp::Delete { key } => { cache.delete(&key); }
            }
            prop_assert!(
                cache.len() <= max_size,
                "Cache size {} exceeds max {}",
                cache.len(),
                max_size
            );
        }
    }

    // *For any* key and value, `set` followed by `get` returns the value.
    #[test]
    fn prop_roundtrip_storage(
        max_size in 1usize..8,
        key in key_strategy(),
        value in any::<u32>()
    ) {
        let mut cache = SegmentedCache::new(max_size).unwrap();
        cache.set(key.clone(), value);

        prop_assert_eq!(cache.get(&key), Some(&value));
    }

    // *For any* key, after `delete` the key is absent, and deleting it
    // again reports false without changing the size.
    #[test]
    fn prop_delete_removes_entry(
        entries in prop::collection::vec((key_strategy(), any::<u32>()), 1..30),
        victim in key_strategy()
    ) {
        let mut cache = SegmentedCache::new(4).unwrap();
        for (key, value) in entries {
            cache.set(key, value);
        }

        cache.delete(&victim);
        prop_assert!(!cache.has(&victim));

        let size = cache.len();
        prop_assert!(!cache.delete(&victim));
        prop_assert_eq!(cache.len(), size);
    }

    // *For any* sequence of operations, every resident key maps to the value
    // it was last set to, and iteration yields each key once.
    #[test]
    fn prop_matches_model(
        max_size in 1usize..8,
        ops in prop::collection::vec(cache_op_strategy(), 1..200)
    ) {
        let mut cache = SegmentedCache::new(max_size).unwrap();
        let mut model: HashMap<String, u32> = HashMap::new();

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    model.insert(key.clone(), value);
                    cache.set(key, value);
                }
                CacheOp::Get { key } => {
                    if let Some(value) = cache.get(&key) {
                        prop_assert_eq!(Some(value), model.get(&key));
                    }
                }
                CacheOp::Peek { key } => {
                    if let Some(value) = cache.peek(&key) {
                        prop_assert_eq!(Some(value), model.get(&key));
                    }
                }
                CacheOp::Delete { key } => {
                    model.remove(&key);
                    cache.delete(&key);
                }
            }
        }

        let mut seen = HashSet::new();
        for (key, value) in cache.iter() {
            prop_assert!(seen.insert(key.clone()), "Key '{}' yielded twice", key);
            prop_assert_eq!(Some(value), model.get(key));
        }
    }

    // *For any* cache whose live entries fit both sizes, shrinking and
    // growing back preserves every key/value pair.
    #[test]
    fn prop_resize_roundtrip(
        entries in prop::collection::vec((key_strategy(), any::<u32>()), 1..20),
        shrink_to in 20usize..40
    ) {
        let mut cache = SegmentedCache::new(TEST_MAX_SIZE).unwrap();
        for (key, value) in entries {
            cache.set(key, value);
        }
        let mut before: Vec<(String, u32)> = cache.iter().map(|(k, v)| (k.clone(), *v)).collect();

        cache.resize(shrink_to).unwrap();
        cache.resize(TEST_MAX_SIZE).unwrap();

        let mut after: Vec<(String, u32)> = cache.iter().map(|(k, v)| (k.clone(), *v)).collect();
        before.sort();
        after.sort();
        prop_assert_eq!(before, after);
    }

    // *For any* cache state, repeated `peek` leaves size, membership and
    // later `get` results unchanged.
    #[test]
    fn prop_peek_is_idempotent(
        max_size in 1usize..8,
        entries in prop::collection::vec((key_strategy(), any::<u32>()), 1..30),
        target in key_strategy()
    ) {
        let mut cache = SegmentedCache::new(max_size).unwrap();
        for (key, value) in entries {
            cache.set(key, value);
        }

        let size = cache.len();
        let ascending: Vec<String> = cache.entries_ascending().map(|(k, _)| k.clone()).collect();
        let first = cache.peek(&target).copied();
        for _ in 0..5 {
            prop_assert_eq!(cache.peek(&target).copied(), first);
        }

        prop_assert_eq!(cache.len(), size);
        let again: Vec<String> = cache.entries_ascending().map(|(k, _)| k.clone()).collect();
        prop_assert_eq!(again, ascending);
        prop_assert_eq!(cache.get(&target).copied(), first);
    }

    // *For any* sequence of gets, the hit and miss counters match what
    // the calls returned.
    #[test]
    fn prop_statistics_accuracy(
        max_size in 1usize..8,
        ops in prop::collection::vec(cache_op_strategy(), 1..100)
    ) {
        let mut cache = SegmentedCache::new(max_size).unwrap();
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => { cache.set(key, value); }
                CacheOp::Get { key } => {
                    match cache.get(&key) {
                        Some(_) => expected_hits += 1,
                        None => expected_misses += 1,
                    }
                }
                CacheOp::Peek { key } => { cache.peek(&key); }
                CacheOp::Delete { key } => { cache.delete(&key); }
            }
        }

        let stats = cache.stats();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.total_entries, cache.len(), "Total entries mismatch");
    }
}
