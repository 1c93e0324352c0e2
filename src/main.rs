//! duotier-bench
//!
//! Drives a cache through a pre-warm pass, a timed `set` pass and a timed
//! `get` pass over the same key space, then prints a latency summary per
//! pass followed by the cache stats as JSON.
//!
//! ```text
//! ┌──────────┐    ┌──────────────┐    ┌──────────────┐    ┌────────────┐
//! │ pre-warm │───▶│ timed set(k) │───▶│ timed get(k) │───▶│ stats JSON │
//! └──────────┘    └──────────────┘    └──────────────┘    └────────────┘
//! ```

use std::path::PathBuf;
use std::time::Instant;

use bytes::Bytes;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use duotier::{Cache, CacheConfig, LatencyRecorder, LatencySummary, Result};

/// Value written for every key
const ZERO: Bytes = Bytes::from_static(b"\0");

// =============================================================================
// CLI Arguments
// =============================================================================

/// Benchmark for the duotier two-tier cache
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Total MFU capacity across all shards
    #[arg(long, env = "DUOTIER_MFU_SIZE")]
    mfu_size: Option<usize>,

    /// Total MRU capacity across all shards
    #[arg(long, env = "DUOTIER_MRU_SIZE")]
    mru_size: Option<usize>,

    /// Writes per shard between eviction sweeps
    #[arg(long, env = "DUOTIER_AUTO_EVICT")]
    auto_evict: Option<u64>,

    /// Number of shards
    #[arg(long, env = "DUOTIER_SHARD_COUNT")]
    shard_count: Option<usize>,

    /// Number of distinct keys per pass
    #[arg(long, env = "DUOTIER_KEYS", default_value = "100000")]
    keys: usize,

    /// YAML cache configuration; command line sizes override it
    #[arg(long, env = "DUOTIER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn cache_config(&self) -> Result<CacheConfig> {
        let mut config = match &self.config {
            Some(path) => CacheConfig::from_yaml_file(path)?,
            None => CacheConfig::default(),
        };

        if let Some(mfu_size) = self.mfu_size {
            config.mfu_size = mfu_size;
        }
        if let Some(mru_size) = self.mru_size {
            config.mru_size = mru_size;
        }
        if let Some(auto_evict) = self.auto_evict {
            config.auto_evict = auto_evict;
        }
        if let Some(shard_count) = self.shard_count {
            config.shard_count = shard_count;
        }

        Ok(config)
    }
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = args.cache_config()?;
    info!("Starting duotier-bench");
    info!("  MRU size: {}", config.mru_size);
    info!("  MFU size: {}", config.mfu_size);
    info!("  Auto-evict: {}", config.auto_evict);
    info!("  Shards: {}", config.shard_count);
    info!("  Keys: {}", args.keys);

    let cache: Cache = Cache::new(config)?;
    let keys: Vec<String> = (0..args.keys).map(|i| i.to_string()).collect();

    // Cache pre-warm
    for key in &keys {
        cache.set(key.clone(), ZERO);
    }

    println!("[ Set {} keys ]", args.keys);
    let summary = timed(&keys, |key| cache.set(key.clone(), ZERO));
    println!("{}", summary);

    println!();

    println!("[ Get {} keys ]", args.keys);
    let summary = timed(&keys, |key| {
        let _ = cache.get(key.as_str());
    });
    println!("{}", summary);

    let stats = serde_json::to_string(&cache.stats())?;
    println!("\n{}", stats);

    cache.stop();
    info!("Benchmark complete");
    Ok(())
}

/// Run `op` once per key, timing every call
fn timed(keys: &[String], mut op: impl FnMut(&String)) -> LatencySummary {
    let mut recorder = LatencyRecorder::with_capacity(keys.len());
    let phase = Instant::now();

    for key in keys {
        let start = Instant::now();
        op(key);
        recorder.record(start.elapsed());
    }

    recorder.summarize(phase.elapsed())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // Logs go to stderr so stdout stays a clean report
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
