//! Scoped, cancellable delayed action.
//!
//! A [`DelayedAction`] runs a closure once after a delay unless it is
//! cancelled first. Dropping the handle cancels it, so a timer can never
//! outlive the component that armed it. Used for the reconnect delay and
//! for notification expiry.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub struct DelayedAction {
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl DelayedAction {
    /// Arm a timer that runs `action` after `delay`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F>(delay: Duration, action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => action(),
            }
        });
        Self { cancel, handle }
    }

    /// Disarm the timer. A no-op if it already fired.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// `true` once the action ran or the timer was cancelled.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for DelayedAction {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
