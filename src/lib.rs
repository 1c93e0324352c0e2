//! duotier - Sharded Two-Tier In-Memory Cache
//!
//! A concurrent key/value cache that splits every shard into a recency tier
//! (MRU) and a frequency tier (MFU). Keys are admitted into MRU and promoted
//! into MFU once they have been accessed often enough. Both tiers are trimmed
//! back to capacity by background eviction workers, so the hot path never
//! blocks on eviction.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                              Cache                               │
//! │   set / get / stats                                              │
//! │        │                                                         │
//! │        ▼                                                         │
//! │  ┌────────────┐   hash(key) % shard_count                        │
//! │  │ Dispatcher │──────────────┐                                   │
//! │  └────────────┘              ▼                                   │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐         ┌─────────┐         │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │   ...   │ Shard N │         │
//! │  │ MRU|MFU │ │ MRU|MFU │ │ MRU|MFU │         │ MRU|MFU │         │
//! │  └────┬────┘ └────┬────┘ └────┬────┘         └────┬────┘         │
//! │       └───────────┴─────┬─────┴───────────────────┘              │
//! │                         ▼ every auto_evict writes                │
//! │                ┌──────────────────┐                              │
//! │                │ EvictionScheduler│  worker threads              │
//! │                └──────────────────┘                              │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`cache`] - Public cache facade
//! - [`config`] - Configuration, defaults and validation
//! - [`dispatch`] - Deterministic key to shard routing
//! - [`entry`] - Stored records and tier tags
//! - [`error`] - Error types
//! - [`latency`] - Latency sampling for the benchmark driver
//! - [`stats`] - Counters and the serializable stats snapshot

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod entry;
pub mod error;
pub mod latency;
pub mod stats;

mod scheduler;
mod shard;
mod tier;

#[cfg(test)]
mod proptest;

// Re-export commonly used types
pub use cache::Cache;
pub use config::{
    CacheConfig, DEFAULT_AUTO_EVICT, DEFAULT_MFU_SIZE, DEFAULT_MRU_SIZE, DEFAULT_PROMOTE_AFTER,
    DEFAULT_SHARD_COUNT,
};
pub use dispatch::{Dispatcher, FxHasher};
pub use entry::{KeyInfo, Tier};
pub use error::{Error, Result};
pub use latency::{LatencyRecorder, LatencySummary};
pub use shard::SweepReport;
pub use stats::CacheStats;
