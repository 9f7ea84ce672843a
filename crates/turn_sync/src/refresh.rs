//! Periodic refresh of the current-games list.
//!
//! Backends without a reliable push channel for game creation need the
//! client to poll. The poll is an explicitly owned task, not something
//! baked into store construction: it can be started, observed, and
//! canceled independently of the cache it refreshes.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, instrument, warn};

use crate::store::GameStore;

/// Handle to a periodic current-games refresh.
///
/// The task is aborted when the handle is dropped or [`RefreshTask::stop`]
/// is called.
pub struct RefreshTask {
    handle: JoinHandle<()>,
}

impl RefreshTask {
    /// Spawns a task re-fetching the current-games map on the given
    /// period. The first refresh runs immediately.
    #[instrument(skip(store))]
    pub fn spawn<M>(store: GameStore<M>, period: Duration) -> Self
    where
        M: Clone + Send + Sync + 'static,
    {
        info!(period_ms = period.as_millis() as u64, "Starting current-games refresh task");
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(error) = store.fetch_my_current_games().await {
                    warn!(%error, "Periodic current-games refresh failed");
                }
            }
        });
        Self { handle }
    }

    /// Cancels the refresh task.
    #[instrument(skip(self))]
    pub fn stop(self) {
        info!("Stopping current-games refresh task");
        self.handle.abort();
    }

    /// Checks whether the task has stopped running.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
