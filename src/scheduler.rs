//! Eviction Scheduler
//!
//! Background workers that keep both tiers of every shard within capacity.
//!
//! # Design
//!
//! ```text
//!  set/get ──▶ Shard (write counter hits auto_evict, queued flag flips)
//!                 │
//!                 ▼ try_send(shard index), never blocks
//!          ┌──────────────┐
//!          │ bounded chan │  capacity = shard_count
//!          └──────┬───────┘
//!                 ▼
//!   duotier-evict-0 .. duotier-evict-N   (lock one shard, evict, unlock)
//! ```
//!
//! The queued flag guarantees at most one pending signal per shard, so the
//! channel can never fill up. The flag is claimed by whoever sends a signal
//! and released only by the worker that dequeues it; periodic and manual
//! sweeps leave it alone. Worker 0 optionally also runs a periodic sweep of
//! every shard that is over capacity.

use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use crossbeam::select;
use crossbeam::utils::CachePadded;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::shard::{Shard, SweepReport};

/// Shard array shared between the cache facade and the workers
pub(crate) type Shards<K> = Arc<[CachePadded<Shard<K>>]>;

/// Handle to the background eviction workers
pub(crate) struct EvictionScheduler {
    /// Shard indices awaiting a sweep
    tx: Sender<usize>,
    /// Dropping this sender disconnects every worker's stop receiver
    stop_tx: Mutex<Option<Sender<()>>>,
    /// Worker threads
    workers: Mutex<Vec<JoinHandle<()>>>,
    /// While set, signals are acknowledged without evicting
    paused: Arc<AtomicBool>,
}

impl EvictionScheduler {
    /// Spawn `config.eviction_workers` worker threads
    pub(crate) fn start<K>(shards: Shards<K>, config: &CacheConfig) -> Result<Self>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
    {
        let (tx, rx) = channel::bounded(shards.len());
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);
        let paused = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(config.eviction_workers);
        for id in 0..config.eviction_workers {
            let worker = Worker {
                id,
                shards: Arc::clone(&shards),
                rx: rx.clone(),
                stop_rx: stop_rx.clone(),
                ticker: match config.sweep_interval() {
                    Some(every) if id == 0 => channel::tick(every),
                    _ => channel::never(),
                },
                paused: Arc::clone(&paused),
                evict_log: config.evict_log,
            };

            // On error the workers already spawned see stop_tx dropped and exit.
            let handle = thread::Builder::new()
                .name(format!("duotier-evict-{}", id))
                .spawn(move || worker.run())
                .map_err(Error::Spawn)?;
            workers.push(handle);
        }

        info!(
            "Started {} eviction worker(s) over {} shards",
            config.eviction_workers,
            shards.len()
        );

        Ok(Self {
            tx,
            stop_tx: Mutex::new(Some(stop_tx)),
            workers: Mutex::new(workers),
            paused,
        })
    }

    /// Queue a shard for a sweep. Never blocks.
    ///
    /// Returns `false` if the signal could not be delivered (scheduler
    /// stopped); the caller should then release the shard's queued flag.
    pub(crate) fn notify(&self, shard: usize) -> bool {
        match self.tx.try_send(shard) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                // Unreachable while the queued flag coalesces signals
                warn!("Eviction queue full, dropping signal for shard {}", shard);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub(crate) fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    pub(crate) fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub(crate) fn is_running(&self) -> bool {
        self.stop_tx.lock().is_some()
    }

    /// Halt future sweeps and wait for the workers to exit.
    ///
    /// A sweep already in progress runs to completion. Idempotent.
    pub(crate) fn stop(&self) {
        if self.stop_tx.lock().take().is_none() {
            return;
        }

        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in workers {
            if handle.join().is_err() {
                warn!("Eviction worker panicked before shutdown");
            }
        }
        info!("Eviction scheduler stopped");
    }
}

impl Drop for EvictionScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker<K> {
    id: usize,
    shards: Shards<K>,
    rx: Receiver<usize>,
    stop_rx: Receiver<()>,
    ticker: Receiver<Instant>,
    paused: Arc<AtomicBool>,
    evict_log: bool,
}

impl<K: Hash + Eq + Clone> Worker<K> {
    fn run(self) {
        debug!("Eviction worker {} running", self.id);

        loop {
            select! {
                recv(self.rx) -> msg => match msg {
                    Ok(index) => self.handle(index),
                    Err(_) => break,
                },
                recv(self.ticker) -> _ => self.sweep_over_capacity(),
                recv(self.stop_rx) -> _ => break,
            }
        }

        debug!("Eviction worker {} exiting", self.id);
    }

    fn handle(&self, index: usize) {
        let Some(shard) = self.shards.get(index) else {
            warn!("Eviction signal for unknown shard {}", index);
            return;
        };

        let report = if self.paused.load(Ordering::Acquire) {
            shard.acknowledge();
            // A resume racing with the acknowledge may have failed to requeue
            if self.paused.load(Ordering::Acquire) {
                return;
            }
            shard.sweep()
        } else {
            shard.sweep_queued()
        };
        self.log_sweep(index, &report);
    }

    fn sweep_over_capacity(&self) {
        if self.paused.load(Ordering::Acquire) {
            return;
        }

        for (index, shard) in self.shards.iter().enumerate() {
            if shard.is_over_capacity() {
                let report = shard.sweep();
                self.log_sweep(index, &report);
            }
        }
    }

    fn log_sweep(&self, index: usize, report: &SweepReport) {
        if report.total() == 0 {
            return;
        }
        if self.evict_log {
            info!(
                "Swept shard {}: evicted {} MRU, {} MFU",
                index, report.mru_evicted, report.mfu_evicted
            );
        } else {
            debug!(
                "Swept shard {}: evicted {} MRU, {} MFU",
                index, report.mru_evicted, report.mfu_evicted
            );
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
