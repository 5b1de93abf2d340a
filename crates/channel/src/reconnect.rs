//! Fixed-delay reconnection for the push channel.
//!
//! After a connection error or close the channel schedules exactly one
//! reconnect attempt after [`ReconnectConfig::delay`]. Attempts repeat
//! indefinitely; there is no attempt cap and no growth of the delay.

use std::time::Duration;

use tokio::sync::oneshot;

use crate::timer::DelayedAction;

/// Default delay between a disconnect and the next attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// Holds at most one armed reconnect timer.
pub struct ReconnectSchedule {
    config: ReconnectConfig,
    timer: Option<DelayedAction>,
    fired: Option<oneshot::Receiver<()>>,
    attempts: u64,
}

impl ReconnectSchedule {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            timer: None,
            fired: None,
            attempts: 0,
        }
    }

    /// Arm the reconnect timer.
    ///
    /// Returns `false` (and arms nothing) when a timer is already pending,
    /// so repeated close/error signals collapse into one attempt.
    pub fn schedule(&mut self) -> bool {
        if self.is_armed() {
            return false;
        }
        let (tx, rx) = oneshot::channel();
        self.timer = Some(DelayedAction::spawn(self.config.delay, move || {
            let _ = tx.send(());
        }));
        self.fired = Some(rx);
        true
    }

    pub fn is_armed(&self) -> bool {
        self.fired.is_some()
    }

    /// Wait for the armed timer, then disarm. Returns immediately when
    /// nothing is armed. Safe to drop mid-wait inside `select!`.
    ///
    /// Only a timer that actually elapsed counts as an attempt.
    pub async fn fired(&mut self) {
        if let Some(rx) = self.fired.as_mut() {
            if rx.await.is_ok() {
                self.attempts += 1;
            }
        }
        self.fired = None;
        self.timer = None;
    }

    /// Disarm without firing.
    pub fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.fired = None;
    }

    /// Number of reconnect attempts released so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn delay(&self) -> Duration {
        self.config.delay
    }
}
