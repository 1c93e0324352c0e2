//! Cache Statistics
//!
//! Each shard owns a [`ShardCounters`] block. Counters are written while the
//! shard lock is held but are plain atomics, so aggregation reads them without
//! taking any lock. A snapshot is therefore not atomic across shards: every
//! shard is read at a slightly different instant.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Per-shard counters
#[derive(Debug, Default)]
pub(crate) struct ShardCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    evictions: AtomicU64,
    promotions: AtomicU64,
    sweeps: AtomicU64,
    mru_len: AtomicU64,
    mfu_len: AtomicU64,
}

impl ShardCounters {
    #[inline]
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_promotion(&self) {
        self.promotions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sweep(&self, evicted: u64) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        self.evictions.fetch_add(evicted, Ordering::Relaxed);
    }

    /// Publish tier occupancy after a mutation
    #[inline]
    pub(crate) fn update_occupancy(&self, mru_len: usize, mfu_len: usize) {
        self.mru_len.store(mru_len as u64, Ordering::Relaxed);
        self.mfu_len.store(mfu_len as u64, Ordering::Relaxed);
    }

    pub(crate) fn mru_len(&self) -> u64 {
        self.mru_len.load(Ordering::Relaxed)
    }

    pub(crate) fn mfu_len(&self) -> u64 {
        self.mfu_len.load(Ordering::Relaxed)
    }

    fn add_to(&self, stats: &mut CacheStats) {
        stats.hits += self.hits.load(Ordering::Relaxed);
        stats.misses += self.misses.load(Ordering::Relaxed);
        stats.sets += self.sets.load(Ordering::Relaxed);
        stats.evictions += self.evictions.load(Ordering::Relaxed);
        stats.promotions += self.promotions.load(Ordering::Relaxed);
        stats.sweeps += self.sweeps.load(Ordering::Relaxed);
        stats.mru_size += self.mru_len();
        stats.mfu_size += self.mfu_len();
    }
}

/// Point-in-time snapshot of cache health
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Successful lookups
    pub hits: u64,
    /// Lookups of absent keys
    pub misses: u64,
    /// Calls to `set`
    pub sets: u64,
    /// Entries removed by eviction sweeps
    pub evictions: u64,
    /// MRU to MFU moves
    pub promotions: u64,
    /// Completed eviction sweeps
    pub sweeps: u64,
    /// Current MRU occupancy, all shards
    pub mru_size: u64,
    /// Current MFU occupancy, all shards
    pub mfu_size: u64,
    /// MRU capacity, all shards
    pub mru_capacity: u64,
    /// MFU capacity, all shards
    pub mfu_capacity: u64,
    /// MRU occupancy as a percentage of capacity (may exceed 100 between sweeps)
    pub mru_used_pct: f64,
    /// MFU occupancy as a percentage of capacity
    pub mfu_used_pct: f64,
    /// hits / (hits + misses)
    pub hit_ratio: f64,
    /// Number of shards
    pub shard_count: usize,
}

/// Fold per-shard counters into one snapshot
pub(crate) fn aggregate<'a>(
    counters: impl IntoIterator<Item = &'a ShardCounters>,
    mru_capacity_per_shard: usize,
    mfu_capacity_per_shard: usize,
) -> CacheStats {
    let mut stats = CacheStats::default();
    for shard in counters {
        shard.add_to(&mut stats);
        stats.shard_count += 1;
    }

    stats.mru_capacity = (mru_capacity_per_shard * stats.shard_count) as u64;
    stats.mfu_capacity = (mfu_capacity_per_shard * stats.shard_count) as u64;
    stats.mru_used_pct = percent(stats.mru_size, stats.mru_capacity);
    stats.mfu_used_pct = percent(stats.mfu_size, stats.mfu_capacity);

    let lookups = stats.hits + stats.misses;
    stats.hit_ratio = if lookups == 0 {
        0.0
    } else {
        stats.hits as f64 / lookups as f64
    };

    stats
}

fn percent(used: u64, capacity: u64) -> f64 {
    if capacity == 0 {
        0.0
    } else {
        used as f64 / capacity as f64 * 100.0
    }
}

// =============================================================================
// Tests
// =============================================================================
