//! Headless rendering of the dashboard state as structured log lines.

use std::time::Duration;

use taskboard_core::stats::TaskStatistics;
use taskboard_core::types::Timestamp;
use taskboard_sync::projection::{
    aggregate, priority_queue, timeline, worker_summaries, StatusCounts, WorkerLabel,
    TIMELINE_ROWS, TIMELINE_WINDOW,
};
use taskboard_sync::DashboardState;
use tokio::sync::watch;

/// Queue entries shown in the summary line.
const QUEUE_PREVIEW: usize = 3;

/// Minimum spacing between summary lines.
pub const SUMMARY_INTERVAL: Duration = Duration::from_secs(1);

/// What one summary line reports.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub connected: bool,
    pub counts: StatusCounts,
    pub completion_rate: f64,
    pub server: Option<TaskStatistics>,
    /// `"name (P1 - Critical)"` for the head of the priority queue.
    pub queue_head: Vec<String>,
    pub active_bars: usize,
    pub workers_busy: usize,
    pub workers_total: usize,
    pub logs: usize,
    pub notification: Option<String>,
}

impl Summary {
    pub fn of(state: &DashboardState, now: Timestamp) -> Self {
        let snapshot = &state.snapshot;
        let stats = aggregate(snapshot);
        let workers = worker_summaries(snapshot);

        Self {
            connected: state.connected,
            counts: stats.counts,
            completion_rate: stats.completion_rate,
            server: snapshot.statistics,
            queue_head: priority_queue(snapshot, QUEUE_PREVIEW)
                .into_iter()
                .map(|t| format!("{} ({})", t.name, t.priority))
                .collect(),
            active_bars: timeline(snapshot, now, TIMELINE_WINDOW, TIMELINE_ROWS).len(),
            workers_busy: workers
                .iter()
                .filter(|w| w.label == WorkerLabel::Working)
                .count(),
            workers_total: workers.len(),
            logs: state.logs.len(),
            notification: state.notification.as_ref().map(|n| n.text.clone()),
        }
    }

    pub fn log(&self) {
        tracing::info!(
            connected = self.connected,
            pending = self.counts.pending,
            running = self.counts.running,
            completed = self.counts.completed,
            failed = self.counts.failed,
            completion_rate = self.completion_rate,
            server_pending = self.server.map(|s| s.pending),
            queue = ?self.queue_head,
            active_bars = self.active_bars,
            workers = %format_args!("{}/{}", self.workers_busy, self.workers_total),
            logs = self.logs,
            notification = self.notification.as_deref(),
            "Dashboard",
        );
    }
}

/// Log a summary whenever the state changed, at most once per
/// [`SUMMARY_INTERVAL`]. Returns when the runtime stops publishing.
pub async fn run(mut state: watch::Receiver<DashboardState>) {
    let mut ticker = tokio::time::interval(SUMMARY_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match state.has_changed() {
            Ok(true) => {}
            Ok(false) => continue,
            Err(_) => break,
        }
        let current = state.borrow_and_update().clone();
        Summary::of(&current, chrono::Utc::now()).log();
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, Utc};
    use taskboard_core::task::{Priority, Task, TaskStatus};
    use taskboard_core::worker::{Worker, WorkerStatus};
    use taskboard_sync::reconciler::BulkSnapshot;
    use taskboard_sync::{Reconciler, Update};

    use super::*;

    #[test]
    fn summary_reports_projections() {
        let now = Utc::now();
        let mut running = Task::new("r", "Render").with_status(TaskStatus::Running);
        running.assignee = Some("worker-1".into());
        running.started_at = Some(now - ChronoDuration::seconds(5));
        let mut done = Task::new("d", "Digest").with_status(TaskStatus::Completed);
        done.assignee = Some("worker-1".into());

        let mut reconciler = Reconciler::new();
        reconciler.apply(Update::BulkSnapshot(BulkSnapshot {
            tasks: vec![
                running,
                done,
                Task::new("low", "Cleanup").with_priority(Priority::LOW),
                Task::new("hot", "Hotfix").with_priority(Priority::CRITICAL),
            ],
            workers: vec![
                Worker::node("worker-1", WorkerStatus::Active),
                Worker::node("worker-2", WorkerStatus::Idle),
            ],
            statistics: Some(TaskStatistics {
                pending: 2,
                running: 1,
                completed: 1,
                failed: 0,
            }),
        }));

        let state = DashboardState {
            snapshot: reconciler.snapshot(),
            connected: true,
            ..DashboardState::default()
        };
        let summary = Summary::of(&state, now);

        assert!(summary.connected);
        assert_eq!(summary.counts.pending, 2);
        assert_eq!(summary.counts.running, 1);
        assert_eq!(summary.completion_rate, 50.0);
        assert_eq!(summary.server.map(|s| s.total()), Some(4));
        assert_eq!(
            summary.queue_head,
            ["Hotfix (P1 - Critical)", "Cleanup (P4 - Low)"]
        );
        assert_eq!(summary.active_bars, 1);
        assert_eq!((summary.workers_busy, summary.workers_total), (1, 2));
        assert_eq!(summary.notification, None);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_with_the_runtime() {
        let (tx, rx) = watch::channel(DashboardState::default());
        let task = tokio::spawn(run(rx));
        tx.send_replace(DashboardState {
            connected: true,
            ..DashboardState::default()
        });
        tokio::time::sleep(SUMMARY_INTERVAL * 2).await;
        drop(tx);
        tokio::time::timeout(SUMMARY_INTERVAL * 3, task)
            .await
            .unwrap()
            .unwrap();
    }
}
