//! Tier Stores
//!
//! Both tiers are ordered indices over the shard's entry table: they hold the
//! key at the entry's position and nothing else. Victims are always taken from
//! the low end of the index.
//!
//! - MRU: `stamp -> key`. Stamps grow monotonically, so the smallest stamp is
//!   the least recently touched key.
//! - MFU: `(access_count, seq) -> key`. Lowest count goes first; among equal
//!   counts the key that entered MFU earliest goes first.

use std::collections::BTreeMap;

/// Recency-ordered tier
#[derive(Debug)]
pub(crate) struct MruStore<K> {
    order: BTreeMap<u64, K>,
    next_stamp: u64,
    capacity: usize,
}

impl<K> MruStore<K> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            order: BTreeMap::new(),
            next_stamp: 0,
            capacity,
        }
    }

    /// Insert at the front, returning the stamp that locates the key
    pub(crate) fn push_front(&mut self, key: K) -> u64 {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        self.order.insert(stamp, key);
        stamp
    }

    /// Move the key at `stamp` to the front. Returns its new stamp.
    pub(crate) fn touch(&mut self, stamp: u64) -> Option<u64> {
        let key = self.order.remove(&stamp)?;
        Some(self.push_front(key))
    }

    pub(crate) fn remove(&mut self, stamp: u64) -> Option<K> {
        self.order.remove(&stamp)
    }

    /// Remove the least recently used key
    pub(crate) fn pop_back(&mut self) -> Option<K> {
        self.order.pop_first().map(|(_, key)| key)
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    /// Entries above capacity
    pub(crate) fn overflow(&self) -> usize {
        self.len().saturating_sub(self.capacity)
    }

    pub(crate) fn clear(&mut self) {
        self.order.clear();
    }

    /// Keys from most to least recent
    #[cfg(test)]
    pub(crate) fn keys_front_to_back(&self) -> impl Iterator<Item = &K> {
        self.order.values().rev()
    }
}

/// Frequency-ordered tier
#[derive(Debug)]
pub(crate) struct MfuStore<K> {
    order: BTreeMap<(u64, u64), K>,
    next_seq: u64,
    capacity: usize,
}

impl<K> MfuStore<K> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            order: BTreeMap::new(),
            next_seq: 0,
            capacity,
        }
    }

    /// Insert with the given access count, returning the key's sequence number
    pub(crate) fn insert(&mut self, key: K, access_count: u64) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert((access_count, seq), key);
        seq
    }

    /// Move a key from `old_count` to `new_count`, keeping its sequence number
    pub(crate) fn rerank(&mut self, seq: u64, old_count: u64, new_count: u64) -> bool {
        match self.order.remove(&(old_count, seq)) {
            Some(key) => {
                self.order.insert((new_count, seq), key);
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove(&mut self, seq: u64, access_count: u64) -> Option<K> {
        self.order.remove(&(access_count, seq))
    }

    /// Remove the least frequently used key
    pub(crate) fn pop_least(&mut self) -> Option<K> {
        self.order.pop_first().map(|(_, key)| key)
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn overflow(&self) -> usize {
        self.len().saturating_sub(self.capacity)
    }

    pub(crate) fn clear(&mut self) {
        self.order.clear();
    }

    /// Keys from most to least frequently used
    #[cfg(test)]
    pub(crate) fn keys_most_frequent(&self) -> impl Iterator<Item = &K> {
        self.order.values().rev()
    }
}

// =============================================================================
// Tests
// =============================================================================
