//! Expiry Sweep Task
//!
//! Background task that periodically sweeps every registered cache, so
//! idle caches release expired entries without waiting for traffic.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::registry::CacheManager;

/// Spawns a background task that periodically sweeps every cache.
///
/// The task runs in an infinite loop, sleeping for the specified interval
/// between sweeps. Sweeps only take each cache's locks briefly, so
/// requests keep flowing while one runs.
///
/// # Arguments
/// * `manager` - Registry whose caches are swept
/// * `sweep_interval_secs` - Interval in seconds between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let manager = Arc::new(CacheManager::default());
/// let sweep_handle = spawn_sweep_task(manager.clone(), 1);
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task(manager: Arc<CacheManager>, sweep_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(sweep_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting expiry sweep task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            // Sleep for the configured interval
            tokio::time::sleep(interval).await;

            let sweeper = Arc::clone(&manager);
            let removed = match tokio::task::spawn_blocking(move || sweeper.clear_expired_all()).await {
                Ok(removed) => removed,
                Err(err) => {
                    error!(error = %err, "Expiry sweep failed");
                    continue;
                }
            };

            // Log sweep statistics
            if removed > 0 {
                info!("Expiry sweep: removed {} entries", removed);
            } else {
                debug!("Expiry sweep: nothing to remove");
            }
        }
    })
}
