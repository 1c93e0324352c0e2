//! Key to Shard Dispatch
//!
//! Routing uses a fixed-seed FxHash so that the same key maps to the same
//! shard in every cache instance and every process with the same shard count.
//! `std`'s `RandomState` is seeded per process and is not used here.

use std::hash::{Hash, Hasher};

use crate::error::{Error, Result};

const SEED: u64 = 0x517cc1b727220a95;

/// Fast non-cryptographic hasher (FxHash algorithm) with a final avalanche
/// step so that both low and high bits are usable for modulo reduction.
#[derive(Debug, Clone, Copy)]
pub struct FxHasher {
    hash: u64,
}

impl Default for FxHasher {
    fn default() -> Self {
        Self { hash: SEED }
    }
}

impl Hasher for FxHasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            let mixed = self.hash.rotate_left(5) ^ byte as u64;
            self.hash = mixed.wrapping_mul(SEED);
        }
    }

    #[inline]
    fn finish(&self) -> u64 {
        // fmix64 from MurmurHash3
        let mut h = self.hash;
        h ^= h >> 33;
        h = h.wrapping_mul(0xff51afd7ed558ccd);
        h ^= h >> 33;
        h = h.wrapping_mul(0xc4ceb9fe1a85ec53);
        h ^= h >> 33;
        h
    }
}

/// Maps keys to shard indices
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    shard_count: usize,
}

impl Dispatcher {
    /// Create a dispatcher over `shard_count` shards
    pub fn new(shard_count: usize) -> Result<Self> {
        if shard_count == 0 {
            return Err(Error::config("shard_count must be greater than 0"));
        }
        Ok(Self { shard_count })
    }

    /// Number of shards routed over
    #[inline]
    pub fn shard_count(&self) -> usize {
        self.shard_count
    }

    /// Shard index for a key
    #[inline]
    pub fn shard_for<Q: Hash + ?Sized>(&self, key: &Q) -> usize {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        (hasher.finish() % self.shard_count as u64) as usize
    }
}

// =============================================================================
// Tests
// =============================================================================
