//! Property-Based Tests for the Cache
//!
//! Drives caches through random operation sequences and checks them against
//! a plain map model.
//!
//! # Test Properties
//!
//! 1. **Consistency**: every entry is indexed by exactly one tier
//! 2. **Read-After-Write**: a key that was not evicted reads back its last value
//! 3. **Capacity**: after a sweep every tier is within capacity
//! 4. **Routing**: the same key always maps to the same shard

#![cfg(test)]

use std::collections::HashMap;

use proptest::prelude::*;

use crate::cache::Cache;
use crate::config::CacheConfig;
use crate::dispatch::Dispatcher;
use crate::entry::Tier;

// =============================================================================
// Property Strategies
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Set(u8, u8),
    Get(u8),
    Delete(u8),
    Sweep,
}

/// Keys are drawn from a small space so that updates and promotions happen
fn key(k: u8) -> String {
    format!("k{}", k % 24)
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (any::<u8>(), any::<u8>()).prop_map(|(k, v)| Op::Set(k, v)),
        4 => any::<u8>().prop_map(Op::Get),
        1 => any::<u8>().prop_map(Op::Delete),
        1 => Just(Op::Sweep),
    ]
}

/// (mru_size, mfu_size, shard_count)
fn shape_strategy() -> impl Strategy<Value = (usize, usize, usize)> {
    (1usize..=16, 1usize..=16, 1usize..=4)
}

/// Background eviction never fires, so only `Op::Sweep` evicts
fn quiet_cache(mru: usize, mfu: usize, shards: usize) -> Cache {
    let config = CacheConfig {
        mru_size: mru,
        mfu_size: mfu,
        shard_count: shards,
        auto_evict: u64::MAX,
        ..Default::default()
    };
    Cache::new(config).unwrap()
}

// =============================================================================
// Model Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Random operations agree with a map model and keep tiers consistent
    #[test]
    fn prop_matches_model(
        (mru, mfu, shards) in shape_strategy(),
        ops in prop::collection::vec(op_strategy(), 1..200),
    ) {
        let cache = quiet_cache(mru, mfu, shards);
        let mut model: HashMap<String, Vec<u8>> = HashMap::new();
        let mut sets = 0u64;

        for op in ops {
            match op {
                Op::Set(k, v) => {
                    cache.set(key(k), vec![v]);
                    model.insert(key(k), vec![v]);
                    sets += 1;
                }
                Op::Get(k) => {
                    let got = cache.get(key(k).as_str());
                    let expected = model.get(&key(k)).map(|v| v.as_slice());
                    prop_assert_eq!(got.as_deref(), expected);
                }
                Op::Delete(k) => {
                    let present = model.remove(&key(k)).is_some();
                    prop_assert_eq!(cache.delete(key(k).as_str()), present);
                }
                Op::Sweep => {
                    cache.sweep_now();
                    model.retain(|k, _| cache.contains(k.as_str()));

                    let stats = cache.stats();
                    prop_assert!(stats.mru_size <= stats.mru_capacity);
                    prop_assert!(stats.mfu_size <= stats.mfu_capacity);
                }
            }

            cache.assert_consistent();
            prop_assert_eq!(cache.len(), model.len());
        }

        let stats = cache.stats();
        prop_assert_eq!(stats.sets, sets);
        prop_assert_eq!(stats.mru_size + stats.mfu_size, cache.len() as u64);
    }

    /// Every cached key lives in exactly one tier
    #[test]
    fn prop_tier_exclusive(
        keys in prop::collection::vec(any::<u8>(), 1..100),
        reads in prop::collection::vec(any::<u8>(), 0..100),
    ) {
        let cache = quiet_cache(8, 8, 2);
        for k in &keys {
            cache.set(key(*k), vec![*k]);
        }
        for k in &reads {
            let _ = cache.get(key(*k).as_str());
        }

        let stats = cache.stats();
        let (mut in_mru, mut in_mfu) = (0u64, 0u64);
        for k in 0..24u8 {
            match cache.tier_of(key(k).as_str()) {
                Some(Tier::Mru) => in_mru += 1,
                Some(Tier::Mfu) => in_mfu += 1,
                None => prop_assert!(!cache.contains(key(k).as_str())),
            }
        }
        prop_assert_eq!(in_mru, stats.mru_size);
        prop_assert_eq!(in_mfu, stats.mfu_size);
    }

    /// Reading a fresh key `promote_after` times moves it to MFU
    #[test]
    fn prop_promotion_threshold(promote_after in 1u64..6, k in any::<u8>()) {
        let config = CacheConfig {
            promote_after,
            auto_evict: u64::MAX,
            shard_count: 4,
            ..Default::default()
        };
        let cache: Cache = Cache::new(config).unwrap();
        cache.set(key(k), vec![k]);

        for _ in 1..promote_after {
            let _ = cache.get(key(k).as_str());
            prop_assert_eq!(cache.tier_of(key(k).as_str()), Some(Tier::Mru));
        }
        let _ = cache.get(key(k).as_str());
        prop_assert_eq!(cache.tier_of(key(k).as_str()), Some(Tier::Mfu));
        prop_assert_eq!(cache.stats().promotions, 1);
    }
}

// =============================================================================
// Routing Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_routing_deterministic(key in ".{0,64}", shard_count in 1usize..1024) {
        let a = Dispatcher::new(shard_count).unwrap();
        let b = Dispatcher::new(shard_count).unwrap();

        let idx = a.shard_for(key.as_str());
        prop_assert!(idx < shard_count);
        prop_assert_eq!(idx, a.shard_for(key.as_str()));
        prop_assert_eq!(idx, b.shard_for(&key));
    }
}
