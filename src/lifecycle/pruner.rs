use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::{L2Backend, TieredCache};
use crate::config::Config;

struct PruneTask {
    stop: Arc<Notify>,
    handle: JoinHandle<()>,
}

/// Periodically calls [`TieredCache::prune`] on a background task.
pub struct CachePruner<P, B: L2Backend> {
    cache: Arc<TieredCache<P, B>>,
    interval: Duration,
    task: Mutex<Option<PruneTask>>,
    runs: Arc<AtomicU64>,
    removed: Arc<AtomicU64>,
}

impl<P, B: L2Backend> std::fmt::Debug for CachePruner<P, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachePruner")
            .field("interval", &self.interval)
            .field("running", &self.task.lock().is_some())
            .finish()
    }
}

impl<P, B> CachePruner<P, B>
where
    P: Serialize + DeserializeOwned + Send + Sync + 'static,
    B: L2Backend,
{
    /// `interval` is clamped to at least one millisecond.
    pub fn new(cache: Arc<TieredCache<P, B>>, interval: Duration) -> Self {
        Self {
            cache,
            interval: interval.max(Duration::from_millis(1)),
            task: Mutex::new(None),
            runs: Arc::new(AtomicU64::new(0)),
            removed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Pruner firing every `SKILLFUSE_PRUNE_INTERVAL_SECS`.
    pub fn from_config(cache: Arc<TieredCache<P, B>>, config: &Config) -> Self {
        Self::new(cache, config.prune_interval())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }

    /// Completed prune passes since creation.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Acquire)
    }

    /// Entries removed across all passes.
    pub fn removed(&self) -> u64 {
        self.removed.load(Ordering::Acquire)
    }

    /// Spawns the prune loop. Returns `false` (and does nothing) if it is already running.
    ///
    /// The first pass runs one interval after start. Must be called within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut task = self.task.lock();
        if task.is_some() {
            debug!("Cache pruner already running");
            return false;
        }

        let stop = Arc::new(Notify::new());
        let cache = Arc::clone(&self.cache);
        let runs = Arc::clone(&self.runs);
        let removed = Arc::clone(&self.removed);
        let period = self.interval;
        let stop_signal = Arc::clone(&stop);

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = stop_signal.notified() => break,
                    _ = ticker.tick() => {
                        let count = cache.prune().await;
                        removed.fetch_add(count, Ordering::AcqRel);
                        runs.fetch_add(1, Ordering::AcqRel);
                        if count > 0 {
                            debug!(removed = count, "Pruned expired cache entries");
                        }
                    }
                }
            }
        });

        info!(interval_ms = period.as_millis() as u64, "Started cache pruner");
        *task = Some(PruneTask { stop, handle });
        true
    }

    /// Stops the loop and waits for an in-flight pass to finish. No-op when not running.
    pub async fn stop(&self) {
        let Some(task) = self.task.lock().take() else {
            return;
        };

        // notify_one stores a permit, so a loop busy pruning still sees it on its next select.
        task.stop.notify_one();
        if let Err(e) = task.handle.await {
            warn!(error = %e, "Cache pruner task failed");
        }
        info!(runs = self.runs(), "Stopped cache pruner");
    }
}

impl<P, B: L2Backend> Drop for CachePruner<P, B> {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.handle.abort();
        }
    }
}
