//! Background Tasks Module
//!
//! Contains the periodic expiration sweep and the bridge that runs
//! synchronous store work on tokio's blocking pool.

mod cleanup;

pub use cleanup::{spawn_cleanup_task, CleanupHandle, SWEEP_TIMEOUT};

use crate::error::{CacheError, Result};

/// Runs `f` on the blocking pool.
///
/// LMDB transactions are synchronous and bound to the opening thread, so all
/// store work goes through here instead of running on a runtime worker.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CacheError::Internal(format!("blocking task failed: {}", e)))?
}
