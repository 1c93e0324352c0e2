//! Shard Implementation
//!
//! A shard serializes every operation on the keys routed to it behind one
//! `parking_lot::Mutex`. It owns a single entry table plus the two tier
//! indices over it, so a key can only ever be in one tier.
//!
//! # Write counter
//!
//! Every `set` (and every promotion, which grows MFU) bumps the shard's write
//! counter. When it reaches `auto_evict` the counter resets and the shard asks
//! to be queued for a sweep. The `queued` flag coalesces requests: a shard is
//! queued at most once until the sweep that clears the flag runs.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::trace;

use crate::entry::{Entry, KeyInfo, Placement, Tier};
use crate::stats::ShardCounters;
use crate::tier::{MfuStore, MruStore};

/// Per-shard tuning, fixed at construction
#[derive(Debug, Clone, Copy)]
pub(crate) struct ShardSettings {
    pub mru_capacity: usize,
    pub mfu_capacity: usize,
    pub auto_evict: u64,
    pub promote_after: u64,
}

/// Result of one eviction pass over a shard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries dropped from MRU
    pub mru_evicted: usize,
    /// Entries dropped from MFU
    pub mfu_evicted: usize,
}

impl SweepReport {
    /// Total entries evicted
    pub fn total(&self) -> usize {
        self.mru_evicted + self.mfu_evicted
    }
}

struct ShardState<K> {
    entries: HashMap<K, Entry>,
    mru: MruStore<K>,
    mfu: MfuStore<K>,
    writes: u64,
}

impl<K: Hash + Eq + Clone> ShardState<K> {
    /// Record an access on a resident key: bump its count, reposition it in its
    /// tier and promote it out of MRU once it is hot enough.
    ///
    /// Returns the (possibly replaced) value and whether a promotion happened.
    fn access<Q>(
        &mut self,
        key: &Q,
        promote_after: u64,
        replace: Option<Bytes>,
    ) -> Option<(Bytes, bool)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entry = self.entries.get_mut(key)?;
        if let Some(value) = replace {
            entry.set_value(value);
        }

        let old_count = entry.access_count();
        let count = entry.record_access();
        let mut promoted = false;

        match entry.placement() {
            Placement::Mfu { seq } => {
                let reranked = self.mfu.rerank(seq, old_count, count);
                debug_assert!(reranked, "MFU index out of sync");
            }
            Placement::Mru { stamp } if count >= promote_after => {
                if let Some(owned) = self.mru.remove(stamp) {
                    let seq = self.mfu.insert(owned, count);
                    entry.set_placement(Placement::Mfu { seq });
                    promoted = true;
                }
            }
            Placement::Mru { stamp } => {
                if let Some(stamp) = self.mru.touch(stamp) {
                    entry.set_placement(Placement::Mru { stamp });
                }
            }
        }

        Some((entry.value().clone(), promoted))
    }

    fn insert(&mut self, key: K, value: Bytes) {
        let stamp = self.mru.push_front(key.clone());
        self.entries.insert(key, Entry::new(value, stamp));
    }

    fn remove<Q>(&mut self, key: &Q) -> Option<Entry>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entry = self.entries.remove(key)?;
        match entry.placement() {
            Placement::Mru { stamp } => {
                self.mru.remove(stamp);
            }
            Placement::Mfu { seq } => {
                self.mfu.remove(seq, entry.access_count());
            }
        }
        Some(entry)
    }

    fn evict(&mut self) -> SweepReport {
        let mut report = SweepReport::default();

        for _ in 0..self.mru.overflow() {
            if let Some(key) = self.mru.pop_back() {
                self.entries.remove(&key);
                report.mru_evicted += 1;
            }
        }

        // Dropped outright; MFU victims are not demoted back to MRU.
        for _ in 0..self.mfu.overflow() {
            if let Some(key) = self.mfu.pop_least() {
                self.entries.remove(&key);
                report.mfu_evicted += 1;
            }
        }

        report
    }
}

/// Single shard: entry table, both tiers, counters
pub(crate) struct Shard<K> {
    state: Mutex<ShardState<K>>,
    counters: ShardCounters,
    queued: AtomicBool,
    settings: ShardSettings,
}

impl<K: Hash + Eq + Clone> Shard<K> {
    pub(crate) fn new(settings: ShardSettings) -> Self {
        Self {
            state: Mutex::new(ShardState {
                entries: HashMap::new(),
                mru: MruStore::new(settings.mru_capacity),
                mfu: MfuStore::new(settings.mfu_capacity),
                writes: 0,
            }),
            counters: ShardCounters::default(),
            queued: AtomicBool::new(false),
            settings,
        }
    }

    pub(crate) fn counters(&self) -> &ShardCounters {
        &self.counters
    }

    /// Insert or update. Never evicts.
    ///
    /// Returns `true` when the caller must hand this shard to the eviction
    /// scheduler.
    #[must_use]
    pub(crate) fn set(&self, key: K, value: Bytes) -> bool {
        let mut state = self.state.lock();
        self.counters.record_set();

        let mut writes = 1;
        if state.entries.contains_key(&key) {
            let accessed = state.access(&key, self.settings.promote_after, Some(value));
            if let Some((_, true)) = accessed {
                self.counters.record_promotion();
                writes += 1;
            }
        } else {
            state.insert(key, value);
        }

        self.counters.update_occupancy(state.mru.len(), state.mfu.len());
        self.bump_writes(&mut state, writes)
    }

    /// Look up a key, MFU being the expected hot path.
    ///
    /// The second element has the same meaning as the return value of
    /// [`Shard::set`]: a promotion counts as a write to MFU.
    pub(crate) fn get<Q>(&self, key: &Q) -> (Option<Bytes>, bool)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut state = self.state.lock();

        match state.access(key, self.settings.promote_after, None) {
            Some((value, promoted)) => {
                self.counters.record_hit();
                let mut schedule = false;
                if promoted {
                    trace!("promoted key to MFU");
                    self.counters.record_promotion();
                    self.counters.update_occupancy(state.mru.len(), state.mfu.len());
                    schedule = self.bump_writes(&mut state, 1);
                }
                (Some(value), schedule)
            }
            None => {
                self.counters.record_miss();
                (None, false)
            }
        }
    }

    /// Remove a key from whichever tier holds it. Absent keys are a no-op.
    pub(crate) fn delete<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut state = self.state.lock();
        let removed = state.remove(key).is_some();
        if removed {
            self.counters.update_occupancy(state.mru.len(), state.mfu.len());
        }
        removed
    }

    /// Tier currently holding the key
    pub(crate) fn tier_of<Q>(&self, key: &Q) -> Option<Tier>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.state.lock().entries.get(key).map(Entry::tier)
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Evict both tiers down to capacity. A pending sweep request stays
    /// claimed; only [`Shard::sweep_queued`] releases it.
    pub(crate) fn sweep(&self) -> SweepReport {
        let mut state = self.state.lock();
        self.evict_locked(&mut state)
    }

    /// Sweep on behalf of a dequeued signal, releasing the queued flag
    pub(crate) fn sweep_queued(&self) -> SweepReport {
        let mut state = self.state.lock();
        self.queued.store(false, Ordering::Release);
        self.evict_locked(&mut state)
    }

    fn evict_locked(&self, state: &mut ShardState<K>) -> SweepReport {
        let report = state.evict();
        self.counters.record_sweep(report.total() as u64);
        self.counters.update_occupancy(state.mru.len(), state.mfu.len());
        report
    }

    /// Drop a pending sweep request without evicting
    pub(crate) fn acknowledge(&self) {
        self.queued.store(false, Ordering::Release);
    }

    /// Lock-free check against the last published occupancy
    pub(crate) fn is_over_capacity(&self) -> bool {
        self.counters.mru_len() > self.settings.mru_capacity as u64
            || self.counters.mfu_len() > self.settings.mfu_capacity as u64
    }

    /// Claim the queued flag. `true` means the caller must enqueue the shard.
    pub(crate) fn try_mark_queued(&self) -> bool {
        !self.queued.swap(true, Ordering::AcqRel)
    }

    /// Drop every entry of the given tier, or of both when `tier` is `None`.
    /// Returns the number of entries removed.
    pub(crate) fn flush(&self, tier: Option<Tier>) -> usize {
        let mut state = self.state.lock();
        let before = state.entries.len();

        match tier {
            None => {
                state.entries.clear();
                state.mru.clear();
                state.mfu.clear();
            }
            Some(tier) => {
                state.entries.retain(|_, entry| entry.tier() != tier);
                match tier {
                    Tier::Mru => state.mru.clear(),
                    Tier::Mfu => state.mfu.clear(),
                }
            }
        }

        self.counters.update_occupancy(state.mru.len(), state.mfu.len());
        before - state.entries.len()
    }

    /// The `n` most accessed keys in this shard, most accessed first
    pub(crate) fn top(&self, n: usize) -> Vec<KeyInfo<K>> {
        let state = self.state.lock();
        let mut keys: Vec<KeyInfo<K>> = state
            .entries
            .iter()
            .map(|(key, entry)| KeyInfo {
                key: key.clone(),
                tier: entry.tier(),
                access_count: entry.access_count(),
            })
            .collect();

        keys.sort_by(|a, b| b.access_count.cmp(&a.access_count));
        keys.truncate(n);
        keys
    }

    fn bump_writes(&self, state: &mut ShardState<K>, by: u64) -> bool {
        state.writes += by;
        if state.writes < self.settings.auto_evict {
            return false;
        }
        state.writes = 0;
        self.try_mark_queued()
    }

    /// Check that the entry table and both tier indices agree
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let state = self.state.lock();
        assert_eq!(
            state.entries.len(),
            state.mru.len() + state.mfu.len(),
            "every entry is indexed by exactly one tier"
        );
        let mru = state
            .entries
            .values()
            .filter(|e| e.tier() == Tier::Mru)
            .count();
        assert_eq!(mru, state.mru.len());
        assert_eq!(self.counters.mru_len(), state.mru.len() as u64);
        assert_eq!(self.counters.mfu_len(), state.mfu.len() as u64);
    }

    #[cfg(test)]
    pub(crate) fn tier_lens(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.mru.len(), state.mfu.len())
    }
}

// =============================================================================
// Tests
// =============================================================================
