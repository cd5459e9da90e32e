//! Periodic expiry of stale cache entries.
//!
//! The sweep runs on its own task, sleeping `interval` between runs. A run
//! is a plain synchronous call into the store, so it can never be cut off
//! halfway: [`PurgeScheduler::cancel`] signals the task and then waits for
//! it, which means any run already underway finishes first.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::DatError;
use crate::store::EntryStore;

pub struct PurgeScheduler {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl PurgeScheduler {
    /// Spawn the sweep on the current tokio runtime.
    pub fn start(
        store: Arc<EntryStore>,
        interval: Duration,
        entry_timeout: Duration,
    ) -> Result<Self, DatError> {
        let runtime = tokio::runtime::Handle::try_current()?;
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = runtime.spawn(purge_loop(store, interval, entry_timeout, shutdown_rx));
        Ok(Self { shutdown, task })
    }

    /// Stop the sweep, waiting out a run that is in progress.
    pub async fn cancel(self) {
        // The task may already be gone; either way the join below settles it.
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "purge task ended abnormally");
        }
    }
}

/// Sweep `store` every `interval` until told to stop.
///
/// Dropping the shutdown sender also stops the loop.
async fn purge_loop(
    store: Arc<EntryStore>,
    interval: Duration,
    entry_timeout: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    tracing::debug!(?interval, ?entry_timeout, "purge scheduler started");
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let removed = store.purge_stale(entry_timeout);
        if removed > 0 {
            tracing::debug!(removed, remaining = store.len(), "purged stale entries");
        }
    }
    tracing::debug!("purge scheduler stopped");
}
