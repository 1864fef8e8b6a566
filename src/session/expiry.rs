//! Background re-validation of the session expiry.
//!
//! Navigation already checks expiry through the guard; this task covers the
//! case where the actor sits on one page until the token lapses.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::model::{Session, is_expired};
use super::provider::SessionProvider;

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Reaction to a detected expiry, run after the session has been cleared.
pub trait ExpiryHandler: Send + Sync + 'static {
    fn session_expired(&self, expired: &Session);
}

/// Handle to the watcher task; dropping it stops the task.
pub struct ExpiryWatcher {
    task: JoinHandle<()>,
}

impl ExpiryWatcher {
    pub fn spawn(
        provider: Arc<SessionProvider>,
        interval: Duration,
        handler: Arc<dyn ExpiryHandler>,
    ) -> Self {
        let changes = provider.subscribe();
        let task = tokio::spawn(run(provider, changes, interval, handler));
        Self { task }
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for ExpiryWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    provider: Arc<SessionProvider>,
    mut changes: watch::Receiver<Session>,
    interval: Duration,
    handler: Arc<dyn ExpiryHandler>,
) {
    loop {
        let has_token = changes.borrow_and_update().has_token();

        if !has_token {
            if changes.changed().await.is_err() {
                return;
            }
            continue;
        }

        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(interval_secs = interval.as_secs(), "Expiry check armed");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let session = provider.get();
                    if !session.has_token() {
                        break;
                    }
                    if is_expired(session.expiry.as_deref()) {
                        expire(&provider, &session, handler.as_ref());
                        break;
                    }
                }
                changed = changes.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    // Re-arm against the new session.
                    break;
                }
            }
        }
    }
}

fn expire(provider: &SessionProvider, session: &Session, handler: &dyn ExpiryHandler) {
    info!(uid = ?session.uid, expiry = ?session.expiry, "Session expired; forcing logout");
    if let Err(err) = provider.clear() {
        warn!(error = %err, "Failed to clear expired session from storage");
    }
    handler.session_expired(session);
}
