use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::session::{ExpiryCheck, SessionManager};

/// Shortest accepted check period
const MIN_PERIOD: Duration = Duration::from_millis(10);

/// Background task running the periodic expiry check for a protected view.
/// Dropping the handle stops the task.
pub struct ExpiryWatch {
    handle: Option<JoinHandle<ExpiryCheck>>,
}

impl ExpiryWatch {
    pub(crate) fn spawn(session: Arc<SessionManager>, period: Duration) -> Self {
        let period = period.max(MIN_PERIOD);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // First tick completes immediately
                ticker.tick().await;
                match session.check_expiry().await {
                    ExpiryCheck::Valid => continue,
                    ended => {
                        debug!(?ended, "Expiry watch stopping");
                        return ended;
                    }
                }
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map(JoinHandle::is_finished).unwrap_or(true)
    }

    /// Wait for the watch to end on its own, returning how the session ended.
    /// `None` if the watch was stopped or already awaited.
    pub async fn finished(&mut self) -> Option<ExpiryCheck> {
        let handle = self.handle.take()?;
        handle.await.ok()
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for ExpiryWatch {
    fn drop(&mut self) {
        self.stop();
    }
}
