//! Cache Configuration
//!
//! Sizes are global totals; each shard gets an even share of them, rounded up
//! so that no shard ends up with a zero-capacity tier.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default total capacity of the frequency tier
pub const DEFAULT_MFU_SIZE: usize = 50_000;

/// Default total capacity of the recency tier
pub const DEFAULT_MRU_SIZE: usize = 50_000;

/// Default per-shard write count that triggers an eviction sweep
pub const DEFAULT_AUTO_EVICT: u64 = 1_000;

/// Default number of shards
pub const DEFAULT_SHARD_COUNT: usize = 512;

/// Default number of accesses after which an MRU entry moves to MFU
pub const DEFAULT_PROMOTE_AFTER: u64 = 2;

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Total capacity of the MFU (frequency) tier, in entries
    pub mfu_size: usize,
    /// Total capacity of the MRU (recency) tier, in entries
    pub mru_size: usize,
    /// Writes per shard between eviction sweeps
    pub auto_evict: u64,
    /// Number of independent partitions
    pub shard_count: usize,
    /// Access count at which an MRU entry is promoted to MFU
    pub promote_after: u64,
    /// Number of background eviction worker threads
    pub eviction_workers: usize,
    /// Optional periodic sweep of over-capacity shards, in milliseconds
    pub sweep_interval_ms: Option<u64>,
    /// Log every sweep at info level instead of debug
    pub evict_log: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            mfu_size: DEFAULT_MFU_SIZE,
            mru_size: DEFAULT_MRU_SIZE,
            auto_evict: DEFAULT_AUTO_EVICT,
            shard_count: DEFAULT_SHARD_COUNT,
            promote_after: DEFAULT_PROMOTE_AFTER,
            eviction_workers: 1,
            sweep_interval_ms: None,
            evict_log: false,
        }
    }
}

impl CacheConfig {
    /// Check every field; the first violation is reported.
    pub fn validate(&self) -> Result<()> {
        if self.mru_size == 0 {
            return Err(Error::config("mru_size must be greater than 0"));
        }
        if self.mfu_size == 0 {
            return Err(Error::config("mfu_size must be greater than 0"));
        }
        if self.shard_count == 0 {
            return Err(Error::config("shard_count must be greater than 0"));
        }
        if self.auto_evict == 0 {
            return Err(Error::config("auto_evict must be greater than 0"));
        }
        if self.promote_after == 0 {
            return Err(Error::config("promote_after must be greater than 0"));
        }
        if self.eviction_workers == 0 {
            return Err(Error::config("eviction_workers must be greater than 0"));
        }
        if self.sweep_interval_ms == Some(0) {
            return Err(Error::config("sweep_interval_ms must be greater than 0"));
        }
        Ok(())
    }

    /// Parse a YAML document. Missing fields take their defaults.
    pub fn from_yaml_str(doc: &str) -> Result<Self> {
        let config: CacheConfig = serde_yaml::from_str(doc)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let doc = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&doc)
    }

    /// MRU capacity of a single shard
    pub fn mru_capacity_per_shard(&self) -> usize {
        per_shard(self.mru_size, self.shard_count)
    }

    /// MFU capacity of a single shard
    pub fn mfu_capacity_per_shard(&self) -> usize {
        per_shard(self.mfu_size, self.shard_count)
    }

    /// Periodic sweep interval, if enabled
    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_ms.map(Duration::from_millis)
    }
}

fn per_shard(total: usize, shards: usize) -> usize {
    total.div_ceil(shards.max(1)).max(1)
}

// =============================================================================
// Tests
// =============================================================================
