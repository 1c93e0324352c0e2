//! Cache Facade
//!
//! Owns the shard array, the dispatcher and the eviction scheduler, and
//! exposes the public cache contract.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use bytes::Bytes;
use crossbeam::utils::CachePadded;
use tracing::{debug, info};

use crate::config::CacheConfig;
use crate::dispatch::Dispatcher;
use crate::entry::{KeyInfo, Tier};
use crate::error::Result;
use crate::scheduler::{EvictionScheduler, Shards};
use crate::shard::{Shard, ShardSettings, SweepReport};
use crate::stats::{self, CacheStats};

/// Sharded two-tier cache
///
/// `set`, `get` and `stats` never fail and never wait for eviction: they only
/// take the lock of the shard the key routes to. Capacity is enforced by
/// background sweeps, so a tier may briefly hold up to `auto_evict` extra
/// entries per shard.
///
/// ```no_run
/// use duotier::{Cache, CacheConfig};
///
/// let cache: Cache = Cache::new(CacheConfig::default())?;
/// cache.set("greeting".to_string(), &b"hello"[..]);
/// assert_eq!(cache.get("greeting").as_deref(), Some(&b"hello"[..]));
/// # Ok::<(), duotier::Error>(())
/// ```
pub struct Cache<K = String> {
    shards: Shards<K>,
    dispatcher: Dispatcher,
    config: CacheConfig,
    scheduler: EvictionScheduler,
}

impl<K> Cache<K>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
{
    /// Validate the configuration, allocate the shards and start the
    /// eviction workers.
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;

        let settings = ShardSettings {
            mru_capacity: config.mru_capacity_per_shard(),
            mfu_capacity: config.mfu_capacity_per_shard(),
            auto_evict: config.auto_evict,
            promote_after: config.promote_after,
        };

        let shards: Shards<K> = (0..config.shard_count)
            .map(|_| CachePadded::new(Shard::new(settings)))
            .collect::<Vec<_>>()
            .into();

        let dispatcher = Dispatcher::new(config.shard_count)?;
        let scheduler = EvictionScheduler::start(Arc::clone(&shards), &config)?;

        info!(
            "Cache ready: {} shards, MRU {}/shard, MFU {}/shard, auto-evict every {} writes",
            config.shard_count, settings.mru_capacity, settings.mfu_capacity, config.auto_evict
        );

        Ok(Self {
            shards,
            dispatcher,
            config,
            scheduler,
        })
    }

    /// Insert or update a value
    pub fn set(&self, key: K, value: impl Into<Bytes>) {
        let index = self.dispatcher.shard_for(&key);
        if self.shards[index].set(key, value.into()) {
            self.schedule(index);
        }
    }

    /// Look up a value. Absence is `None`; an empty value is `Some` of an
    /// empty buffer.
    pub fn get<Q>(&self, key: &Q) -> Option<Bytes>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = self.dispatcher.shard_for(key);
        let (value, schedule) = self.shards[index].get(key);
        if schedule {
            self.schedule(index);
        }
        value
    }

    /// Remove a key. Returns whether it was present.
    pub fn delete<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard(key).delete(key)
    }

    /// Whether the key is cached. Does not count as an access.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.tier_of(key).is_some()
    }

    /// Tier currently holding the key. Does not count as an access.
    pub fn tier_of<Q>(&self, key: &Q) -> Option<Tier>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard(key).tier_of(key)
    }

    /// Shard index a key routes to
    pub fn shard_for<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.dispatcher.shard_for(key)
    }

    /// Number of cached entries across both tiers
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.len()).sum()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.len() == 0)
    }

    /// The `n` most accessed keys, most accessed first
    pub fn list(&self, n: usize) -> Vec<KeyInfo<K>> {
        let mut keys: Vec<KeyInfo<K>> = self.shards.iter().flat_map(|s| s.top(n)).collect();
        keys.sort_by(|a, b| b.access_count.cmp(&a.access_count));
        keys.truncate(n);
        keys
    }

    /// Drop every MRU entry. Returns the number removed.
    pub fn flush_mru(&self) -> usize {
        self.flush(Some(Tier::Mru))
    }

    /// Drop every MFU entry. Returns the number removed.
    pub fn flush_mfu(&self) -> usize {
        self.flush(Some(Tier::Mfu))
    }

    /// Drop every entry. Returns the number removed.
    pub fn flush_all(&self) -> usize {
        self.flush(None)
    }

    fn flush(&self, tier: Option<Tier>) -> usize {
        let removed: usize = self.shards.iter().map(|s| s.flush(tier)).sum();
        debug!("Flushed {} entries", removed);
        removed
    }

    /// Sweep every shard on the calling thread, one shard lock at a time
    pub fn sweep_now(&self) -> SweepReport {
        self.shards
            .iter()
            .map(|s| s.sweep())
            .fold(SweepReport::default(), |acc, r| SweepReport {
                mru_evicted: acc.mru_evicted + r.mru_evicted,
                mfu_evicted: acc.mfu_evicted + r.mfu_evicted,
            })
    }

    /// Aggregated counters. Shards are read without a global lock, so the
    /// snapshot is not atomic across shards.
    pub fn stats(&self) -> CacheStats {
        stats::aggregate(
            self.shards.iter().map(|s| s.counters()),
            self.config.mru_capacity_per_shard(),
            self.config.mfu_capacity_per_shard(),
        )
    }

    /// Suspend background eviction. Capacity is not enforced until resumed.
    pub fn pause_eviction(&self) {
        self.scheduler.pause();
        debug!("Eviction paused");
    }

    /// Resume background eviction and queue every shard that overshot
    /// while paused.
    pub fn resume_eviction(&self) {
        self.scheduler.resume();
        for (index, shard) in self.shards.iter().enumerate() {
            if shard.is_over_capacity() && shard.try_mark_queued() {
                self.schedule(index);
            }
        }
        debug!("Eviction resumed");
    }

    /// Whether background eviction is paused
    pub fn is_eviction_paused(&self) -> bool {
        self.scheduler.is_paused()
    }

    /// Stop the eviction workers. The cache stays usable but capacity is no
    /// longer enforced. Idempotent; also done on drop.
    pub fn stop(&self) {
        self.scheduler.stop();
    }

    /// Whether the eviction workers are running
    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Get configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Number of shards
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard<Q>(&self, key: &Q) -> &Shard<K>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        &self.shards[self.dispatcher.shard_for(key)]
    }

    fn schedule(&self, index: usize) {
        if !self.scheduler.notify(index) {
            self.shards[index].acknowledge();
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        for shard in self.shards.iter() {
            shard.assert_consistent();
        }
    }
}

impl<K> fmt::Debug for Cache<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("config", &self.config)
            .field("running", &self.scheduler.is_running())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use assert_matches::assert_matches;
    use std::thread;
    use std::time::{Duration, Instant};

    fn config(mru: usize, mfu: usize, shards: usize, auto_evict: u64) -> CacheConfig {
        CacheConfig {
            mru_size: mru,
            mfu_size: mfu,
            shard_count: shards,
            auto_evict,
            ..Default::default()
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        cond()
    }

    #[test]
    fn test_cache_creation() {
        let cache: Cache = Cache::new(CacheConfig::default()).unwrap();
        assert!(cache.is_empty());
        assert_eq!(cache.shard_count(), 512);
        assert!(cache.is_running());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result: Result<Cache> = Cache::new(config(10, 10, 0, 10));
        assert_matches!(result, Err(Error::Config(_)));
    }

    #[test]
    fn test_set_get() {
        let cache: Cache = Cache::new(config(100, 100, 8, 1000)).unwrap();
        cache.set("key".to_string(), "value");

        assert_eq!(cache.get("key"), Some(Bytes::from_static(b"value")));
        assert_eq!(cache.get("missing"), None);
        assert_eq!(cache.len(), 1);

        let stats = cache.stats();
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.mru_size, 1);
        assert_eq!(stats.shard_count, 8);
    }

    #[test]
    fn test_auto_evict_scenario() {
        let cache: Cache = Cache::new(config(2, 2, 1, 3)).unwrap();
        for key in ["a", "b", "c"] {
            cache.set(key.to_string(), vec![1u8]);
        }

        assert!(wait_until(|| cache.stats().evictions == 1));
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(Bytes::from(vec![1u8])));
        assert_eq!(cache.get("c"), Some(Bytes::from(vec![1u8])));
        cache.assert_consistent();
    }

    #[test]
    fn test_promotion_visible_through_tier_of() {
        let cache: Cache = Cache::new(config(10, 10, 2, 1000)).unwrap();
        cache.set("k".to_string(), "v");
        assert_eq!(cache.tier_of("k"), Some(Tier::Mru));

        cache.get("k");
        cache.get("k");
        assert_eq!(cache.tier_of("k"), Some(Tier::Mfu));
        assert_eq!(cache.stats().promotions, 1);
        assert!(cache.contains("k"));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let cache: Cache = Cache::new(config(10, 10, 2, 1000)).unwrap();
        cache.set("k".to_string(), "v");
        assert!(cache.delete("k"));
        assert!(!cache.delete("k"));
        assert!(!cache.contains("k"));
        assert_eq!(cache.stats().mru_size, 0);
    }

    #[test]
    fn test_list_top_keys() {
        let cache: Cache = Cache::new(config(100, 100, 4, 1000)).unwrap();
        for i in 0..10 {
            cache.set(format!("key-{}", i), "v");
            for _ in 0..i {
                cache.get(format!("key-{}", i).as_str());
            }
        }

        let top = cache.list(3);
        let keys: Vec<_> = top.iter().map(|k| k.key.as_str()).collect();
        assert_eq!(keys, vec!["key-9", "key-8", "key-7"]);
        assert_eq!(top[0].access_count, 9);
        assert_eq!(top[0].tier, Tier::Mfu);
    }

    #[test]
    fn test_flush() {
        let cache: Cache = Cache::new(config(100, 100, 4, 1000)).unwrap();
        for i in 0..6 {
            cache.set(i.to_string(), "v");
        }
        for key in ["0", "1"] {
            cache.get(key);
            cache.get(key);
        }

        assert_eq!(cache.flush_mfu(), 2);
        assert_eq!(cache.flush_mru(), 4);
        assert!(cache.is_empty());

        cache.set("x".to_string(), "v");
        assert_eq!(cache.flush_all(), 1);
        cache.assert_consistent();
    }

    #[test]
    fn test_sweep_now() {
        let cache: Cache = Cache::new(config(4, 4, 1, 1_000_000)).unwrap();
        for i in 0..10 {
            cache.set(i.to_string(), "v");
        }
        let report = cache.sweep_now();
        assert_eq!(report.mru_evicted, 6);
        assert_eq!(cache.len(), 4);
        assert_eq!(cache.stats().evictions, 6);
    }

    #[test]
    fn test_pause_resume() {
        let cache: Cache = Cache::new(config(2, 2, 1, 1)).unwrap();
        cache.pause_eviction();
        assert!(cache.is_eviction_paused());

        for i in 0..10 {
            cache.set(i.to_string(), "v");
        }
        // Give a worker the chance to (not) evict
        thread::sleep(Duration::from_millis(50));
        assert_eq!(cache.len(), 10);

        cache.resume_eviction();
        assert!(wait_until(|| cache.len() == 2));
        cache.assert_consistent();
    }

    #[test]
    fn test_stop_leaves_cache_usable() {
        let cache: Cache = Cache::new(config(2, 2, 1, 1)).unwrap();
        cache.stop();
        assert!(!cache.is_running());

        for i in 0..10 {
            cache.set(i.to_string(), "v");
        }
        assert_eq!(cache.len(), 10);
        assert_eq!(cache.get("9"), Some(Bytes::from_static(b"v")));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_generic_keys() {
        let cache: Cache<u64> = Cache::new(config(100, 100, 4, 1000)).unwrap();
        cache.set(42, vec![4u8, 2]);
        assert_eq!(cache.get(&42u64).as_deref(), Some(&[4u8, 2][..]));
        assert_eq!(cache.shard_for(&42u64), cache.shard_for(&42u64));
    }

    #[test]
    fn test_debug_output() {
        let cache: Cache = Cache::new(config(1, 1, 1, 1)).unwrap();
        let debug = format!("{:?}", cache);
        assert!(debug.contains("Cache"));
        assert!(debug.contains("shard_count"));
    }
}
