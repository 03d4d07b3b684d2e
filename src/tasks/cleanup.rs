//! Expiration Sweep Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::CacheCore;
use crate::error::{CacheError, Result};
use crate::tasks::run_blocking;

/// Upper bound on a single scheduled sweep.
pub const SWEEP_TIMEOUT: Duration = Duration::from_secs(5 * 60);

// == Cleanup Handle ==
/// Owner of a running sweep task.
///
/// Dropping the handle also stops the task, at its next tick at the latest.
pub struct CleanupHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl CleanupHandle {
    /// Signals the task to stop and waits for it to exit.
    ///
    /// A sweep already running is allowed to finish its current transaction.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        self.handle
            .await
            .map_err(|e| CacheError::Internal(format!("cleanup task failed: {}", e)))
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawns a background task that sweeps expired entries every `cleanup_interval`.
///
/// The first sweep runs one full interval after spawning; ticks missed while
/// a slow sweep runs are skipped rather than replayed. Each sweep runs on the
/// blocking pool under [`SWEEP_TIMEOUT`]; failures and timeouts are logged and
/// retried on the next tick.
///
/// # Example
/// ```ignore
/// let cleanup = spawn_cleanup_task(core.clone(), Duration::from_secs(3600));
/// // Later, during shutdown:
/// cleanup.shutdown().await?;
/// ```
pub fn spawn_cleanup_task(core: Arc<CacheCore>, cleanup_interval: Duration) -> CleanupHandle {
    let period = cleanup_interval.max(Duration::from_millis(1));
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        info!(
            interval_secs = period.as_secs_f64(),
            "Starting expiration sweep task"
        );

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    // A dropped sender means the owning cache is gone.
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }

                _ = ticker.tick() => {
                    run_sweep(&core).await;
                }
            }
        }

        info!("Expiration sweep task stopped");
    });

    CleanupHandle {
        shutdown_tx,
        handle,
    }
}

async fn run_sweep(core: &Arc<CacheCore>) {
    let core = Arc::clone(core);
    match timeout(SWEEP_TIMEOUT, run_blocking(move || core.sweep_expired())).await {
        Ok(Ok(report)) => {
            debug!(
                expired = report.expired,
                removed = report.removed,
                "Scheduled sweep finished"
            );
        }
        Ok(Err(e)) => warn!(error = %e, "Scheduled sweep failed, retrying next tick"),
        Err(_) => warn!(
            timeout_secs = SWEEP_TIMEOUT.as_secs(),
            "Scheduled sweep timed out, retrying next tick"
        ),
    }
}
