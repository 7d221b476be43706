use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use super::FetchCoordinator;

/// Owns the refresh timer. Each tick emits a `fetch_requested` into the
/// coordinator; the first tick fires immediately so a fresh start shows data
/// without waiting a full interval. Dropping the poller stops the timer.
pub struct Poller {
    handle: JoinHandle<()>,
}

impl Poller {
    pub fn start(coordinator: Arc<FetchCoordinator>, every: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticks = interval(every);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                coordinator.fetch_requested();
            }
        });
        Self { handle }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
