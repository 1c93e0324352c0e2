//! Latency Sampling
//!
//! Collects per-call timings for the benchmark driver and reduces them to a
//! percentile summary. Percentiles use the nearest-rank method over the
//! sorted samples.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Accumulates call durations for one benchmark phase
#[derive(Debug, Clone, Default)]
pub struct LatencyRecorder {
    samples: Vec<Duration>,
}

impl LatencyRecorder {
    /// Create a recorder with room for `capacity` samples
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Record one call duration
    #[inline]
    pub fn record(&mut self, elapsed: Duration) {
        self.samples.push(elapsed);
    }

    /// Number of recorded samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Reduce the samples to a summary. `wall_time` is the elapsed time of
    /// the whole phase and drives the rate.
    pub fn summarize(&self, wall_time: Duration) -> LatencySummary {
        if self.samples.is_empty() {
            return LatencySummary {
                wall_time,
                ..Default::default()
            };
        }

        let mut sorted = self.samples.clone();
        sorted.sort_unstable();

        let count = sorted.len();
        let total: Duration = sorted.iter().sum();
        let rate = if wall_time.is_zero() {
            0.0
        } else {
            count as f64 / wall_time.as_secs_f64()
        };

        LatencySummary {
            count,
            total,
            min: sorted[0],
            max: sorted[count - 1],
            mean: total / count as u32,
            p50: percentile(&sorted, 50.0),
            p75: percentile(&sorted, 75.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
            p999: percentile(&sorted, 99.9),
            wall_time,
            rate,
        }
    }
}

/// Nearest-rank percentile of an already sorted, non-empty slice
fn percentile(sorted: &[Duration], p: f64) -> Duration {
    let rank = (p / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Percentile summary of one benchmark phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    /// Number of timed calls
    pub count: usize,
    /// Sum of all call durations
    pub total: Duration,
    /// Fastest call
    pub min: Duration,
    /// Slowest call
    pub max: Duration,
    /// Arithmetic mean, truncated to whole nanoseconds
    pub mean: Duration,
    /// Median
    pub p50: Duration,
    /// 75th percentile
    pub p75: Duration,
    /// 95th percentile
    pub p95: Duration,
    /// 99th percentile
    pub p99: Duration,
    /// 99.9th percentile
    pub p999: Duration,
    /// Elapsed time of the whole phase
    pub wall_time: Duration,
    /// Calls per second over the wall time
    pub rate: f64,
}

impl fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} samples", self.count)?;
        writeln!(f, "Cumulative:\t{:?}", self.total)?;
        writeln!(f, "Avg.:\t\t{:?}", self.mean)?;
        writeln!(f, "p50: \t\t{:?}", self.p50)?;
        writeln!(f, "p75:\t\t{:?}", self.p75)?;
        writeln!(f, "p95:\t\t{:?}", self.p95)?;
        writeln!(f, "p99:\t\t{:?}", self.p99)?;
        writeln!(f, "p999:\t\t{:?}", self.p999)?;
        writeln!(f, "Max:\t\t{:?}", self.max)?;
        writeln!(f, "Min:\t\t{:?}", self.min)?;
        writeln!(f, "Wall time:\t{:?}", self.wall_time)?;
        write!(f, "Rate/sec.:\t{:.2}", self.rate)
    }
}

// =============================================================================
// Tests
// =============================================================================
