//! Background token refresh task.
//!
//! State transitions of the loop:
//! - after a successful refresh: wait `interval`
//! - after a failed refresh:     wait `backoff`
//! - a refresh forced elsewhere: restart the `interval` wait

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;

use crate::auth::session::{AuthSession, AuthStatus};

/// Handle to the spawned refresh loop. Dropping it cancels the loop.
pub struct RefreshLoop {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshLoop {
    /// Spawn the loop. `initial` is the status the first sync left behind
    /// and decides whether the first wait is `interval` or `backoff`.
    pub fn spawn(
        session: Arc<AuthSession>,
        interval: Duration,
        backoff: Duration,
        initial: AuthStatus,
    ) -> Self {
        let handle = tokio::spawn(run(session, interval, backoff, initial));
        Self {
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Stop the loop. Idempotent.
    pub fn cancel(&self) {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::debug!("token refresh loop cancelled");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RefreshLoop {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for RefreshLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshLoop")
            .field("running", &self.is_running())
            .finish()
    }
}

async fn run(session: Arc<AuthSession>, interval: Duration, backoff: Duration, initial: AuthStatus) {
    let mut status = initial;
    loop {
        let delay = match status {
            AuthStatus::Authenticated => interval,
            _ => backoff,
        };
        tracing::trace!(delay_ms = delay.as_millis() as u64, "next token refresh scheduled");

        tokio::select! {
            _ = time::sleep(delay) => {
                status = session.sync().await;
                if status != AuthStatus::Authenticated {
                    tracing::warn!(
                        retry_ms = backoff.as_millis() as u64,
                        "token refresh failed, retrying after backoff"
                    );
                }
            }
            _ = session.refreshed() => {
                status = AuthStatus::Authenticated;
            }
        }
    }
}
