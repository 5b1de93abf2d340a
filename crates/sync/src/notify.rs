//! Transient user-facing alerts.
//!
//! [`notification_for`] maps an admitted change to alert text. The
//! [`NotificationPresenter`] holds at most one visible notification: a new
//! one supersedes the old, and each expires after a fixed duration via a
//! [`DelayedAction`] that is disarmed on supersession.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use taskboard_channel::timer::DelayedAction;
use taskboard_core::role::Actor;
use taskboard_core::task::TaskStatus;
use taskboard_core::types::Timestamp;
use tokio::sync::mpsc;

use crate::reconciler::{Change, Source};

pub const DEFAULT_NOTIFICATION_DURATION: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    /// Generation number; later notifications have higher ids.
    pub id: u64,
    pub text: String,
    pub severity: Severity,
    pub created_at: Timestamp,
}

/// Alert text for a change, if it deserves one.
///
/// A task seen for the first time only triggers an alert when it arrived
/// over the push channel; the first poll would otherwise replay history.
pub fn notification_for(change: &Change, actor: &Actor) -> Option<(Severity, String)> {
    let Change::Task {
        source,
        previous,
        current,
    } = change
    else {
        return None;
    };
    if previous.is_none() && *source == Source::Poll {
        return None;
    }

    let label = if current.name.is_empty() {
        current.id.as_str()
    } else {
        current.name.as_str()
    };

    if change.task_reached(TaskStatus::Completed) {
        return Some((Severity::Success, format!("Task completed: {label}")));
    }
    if change.task_reached(TaskStatus::Failed) {
        return Some((Severity::Error, format!("Task failed: {label}")));
    }

    let mine = actor.worker_id();
    let newly_mine = current.assignee.as_deref() == Some(mine.as_str())
        && previous.as_ref().and_then(|p| p.assignee.as_deref()) != Some(mine.as_str());
    if newly_mine && !current.is_terminal() {
        return Some((Severity::Info, format!("New task assigned: {label}")));
    }
    None
}

/// Single-slot notification holder.
///
/// Expiry is delivered on the receiver returned by [`NotificationPresenter::new`];
/// the owner feeds each id back into [`NotificationPresenter::expire`].
pub struct NotificationPresenter {
    duration: Duration,
    current: Option<Notification>,
    timer: Option<DelayedAction>,
    next_id: u64,
    expired: mpsc::UnboundedSender<u64>,
}

impl NotificationPresenter {
    pub fn new(duration: Duration) -> (Self, mpsc::UnboundedReceiver<u64>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                duration,
                current: None,
                timer: None,
                next_id: 0,
                expired: tx,
            },
            rx,
        )
    }

    /// Show `text`, replacing whatever is visible. Must be called inside a
    /// Tokio runtime.
    pub fn show(&mut self, severity: Severity, text: String) -> &Notification {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }

        let id = self.next_id;
        self.next_id += 1;

        let expired = self.expired.clone();
        self.timer = Some(DelayedAction::spawn(self.duration, move || {
            let _ = expired.send(id);
        }));

        tracing::debug!(notification_id = id, ?severity, text = %text, "Showing notification");
        self.current.insert(Notification {
            id,
            text,
            severity,
            created_at: Utc::now(),
        })
    }

    /// Clear the notification with `id` if it is still the visible one.
    /// Returns `true` when something was cleared.
    pub fn expire(&mut self, id: u64) -> bool {
        match &self.current {
            Some(n) if n.id == id => {
                self.current = None;
                self.timer = None;
                true
            }
            _ => false,
        }
    }

    pub fn current(&self) -> Option<&Notification> {
        self.current.as_ref()
    }

    /// Drop the visible notification and disarm its timer.
    pub fn clear(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.current = None;
    }
}
