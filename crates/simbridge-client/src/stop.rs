//! Cooperative stop signal for the session and prediction loops.
//!
//! A [`StopHandle`] is cheap to clone and can be triggered from any task,
//! typically a Ctrl-C handler. Loops check it at every cycle boundary, and
//! idle waits wake immediately when it fires.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct StopState {
    stop_requested: AtomicBool,
    notify: Notify,
}

/// Shared stop flag.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    inner: Arc<StopState>,
}

impl StopHandle {
    /// Create a handle with no stop requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop and wake any pending idle wait.
    pub fn request_stop(&self) {
        self.inner.stop_requested.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.inner.stop_requested.load(Ordering::Acquire)
    }

    /// Sleep for `duration` unless a stop arrives first.
    ///
    /// Returns `true` when the full duration elapsed, `false` when the wait
    /// was cut short by a stop.
    pub async fn sleep_unless_stopped(&self, duration: Duration) -> bool {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent stop is not lost.
        notified.as_mut().enable();
        if self.is_stop_requested() {
            return false;
        }
        tokio::select! {
            () = tokio::time::sleep(duration) => true,
            () = notified => false,
        }
    }
}
