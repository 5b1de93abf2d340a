//! Read-only views derived from a [`Snapshot`].
//!
//! Every function here borrows the snapshot for one derivation and never
//! mutates anything.

use std::time::Duration;

use serde::Serialize;
use taskboard_core::task::{Task, TaskStatus};
use taskboard_core::types::{TaskId, Timestamp, WorkerId};
use taskboard_core::worker::{Availability, WorkerCounters, WorkerStatus};

use crate::reconciler::Snapshot;

/// Rows shown in the priority queue.
pub const PRIORITY_QUEUE_LEN: usize = 10;

/// Trailing window covered by the execution timeline.
pub const TIMELINE_WINDOW: Duration = Duration::from_millis(30_000);

/// Narrowest bar drawn for a non-empty interval, in percent.
pub const MIN_BAR_WIDTH: f64 = 2.0;

/// Rows shown in the execution timeline.
pub const TIMELINE_ROWS: usize = 10;

// ---------------------------------------------------------------------------
// Priority queue
// ---------------------------------------------------------------------------

/// Pending tasks, most urgent first, ties in arrival order.
pub fn priority_queue(snapshot: &Snapshot, limit: usize) -> Vec<&Task> {
    let mut pending: Vec<&Task> = snapshot
        .tasks_by_arrival()
        .into_iter()
        .map(|t| &t.value)
        .filter(|t| t.status == TaskStatus::Pending)
        .collect();
    // Stable: equal priorities keep arrival order.
    pending.sort_by_key(|t| t.priority);
    pending.truncate(limit);
    pending
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// One task's visible interval inside the timeline window, in percent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineBar {
    pub task_id: TaskId,
    pub name: String,
    pub status: TaskStatus,
    pub offset: f64,
    pub width: f64,
}

/// Bars for started tasks overlapping the window ending at `now`, in
/// arrival order, keeping the last `rows`.
pub fn timeline(snapshot: &Snapshot, now: Timestamp, window: Duration, rows: usize) -> Vec<TimelineBar> {
    let window_ms = window.as_millis() as f64;
    if window_ms <= 0.0 {
        return Vec::new();
    }
    let window_start = now.timestamp_millis() as f64 - window_ms;
    let percent = |at: Timestamp| (at.timestamp_millis() as f64 - window_start) / window_ms * 100.0;

    let mut bars: Vec<TimelineBar> = snapshot
        .tasks_by_arrival()
        .into_iter()
        .filter_map(|tracked| {
            let task = &tracked.value;
            let start = task.started_at?;
            let end = task.ended_at.unwrap_or(now);

            let offset = percent(start).max(0.0);
            let width = percent(end).min(100.0) - offset;
            if width <= 0.0 {
                return None;
            }
            Some(TimelineBar {
                task_id: task.id.clone(),
                name: task.name.clone(),
                status: task.status,
                offset,
                width: width.max(MIN_BAR_WIDTH),
            })
        })
        .collect();

    let excess = bars.len().saturating_sub(rows);
    bars.drain(..excess);
    bars
}

// ---------------------------------------------------------------------------
// Aggregate statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub retrying: usize,
}

impl StatusCounts {
    pub fn get(&self, status: TaskStatus) -> usize {
        match status {
            TaskStatus::Pending => self.pending,
            TaskStatus::Running => self.running,
            TaskStatus::Completed => self.completed,
            TaskStatus::Failed => self.failed,
            TaskStatus::Retrying => self.retrying,
        }
    }

    pub fn total(&self) -> usize {
        TaskStatus::ALL.iter().map(|s| self.get(*s)).sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AggregateStats {
    pub counts: StatusCounts,
    /// Tasks with an assignee.
    pub assigned: u64,
    /// Completed tasks among the assigned ones.
    pub completed: u64,
    pub completion_rate: f64,
}

/// Percentage rounded to one decimal; 0 when nothing was assigned.
pub fn completion_rate(assigned: u64, completed: u64) -> f64 {
    if assigned == 0 {
        return 0.0;
    }
    (completed as f64 / assigned as f64 * 1000.0).round() / 10.0
}

pub fn aggregate(snapshot: &Snapshot) -> AggregateStats {
    let mut stats = AggregateStats::default();
    for tracked in snapshot.tasks.values() {
        let task = &tracked.value;
        match task.status {
            TaskStatus::Pending => stats.counts.pending += 1,
            TaskStatus::Running => stats.counts.running += 1,
            TaskStatus::Completed => stats.counts.completed += 1,
            TaskStatus::Failed => stats.counts.failed += 1,
            TaskStatus::Retrying => stats.counts.retrying += 1,
        }
        if task.assignee.is_some() {
            stats.assigned += 1;
            if task.status == TaskStatus::Completed {
                stats.completed += 1;
            }
        }
    }
    stats.completion_rate = completion_rate(stats.assigned, stats.completed);
    stats
}

// ---------------------------------------------------------------------------
// Workers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkerLabel {
    Working,
    Idle,
    Failed,
    Recovering,
}

impl WorkerLabel {
    pub fn of(availability: Availability) -> Self {
        match availability {
            Availability::Node(WorkerStatus::Active) => WorkerLabel::Working,
            Availability::Node(WorkerStatus::Idle) => WorkerLabel::Idle,
            Availability::Node(WorkerStatus::Failed) => WorkerLabel::Failed,
            Availability::Node(WorkerStatus::Recovering) => WorkerLabel::Recovering,
            Availability::Employee { is_working: true } => WorkerLabel::Working,
            Availability::Employee { is_working: false } => WorkerLabel::Idle,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkerLabel::Working => "Working",
            WorkerLabel::Idle => "Idle",
            WorkerLabel::Failed => "Failed",
            WorkerLabel::Recovering => "Recovering",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerSummary {
    pub id: WorkerId,
    pub name: String,
    pub label: WorkerLabel,
    pub current_task: Option<TaskId>,
    pub counters: WorkerCounters,
    pub completion_rate: f64,
    pub last_heartbeat: Option<Timestamp>,
}

/// Workers in arrival order with their derived label.
pub fn worker_summaries(snapshot: &Snapshot) -> Vec<WorkerSummary> {
    snapshot
        .workers_by_arrival()
        .into_iter()
        .map(|tracked| {
            let w = &tracked.value;
            WorkerSummary {
                id: w.id.clone(),
                name: w.name.clone(),
                label: WorkerLabel::of(w.availability),
                current_task: w.current_task.clone(),
                counters: w.counters,
                completion_rate: completion_rate(
                    w.counters.total_assigned,
                    w.counters.total_completed,
                ),
                last_heartbeat: w.last_heartbeat,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use taskboard_core::task::Priority;
    use taskboard_core::worker::Worker;

    use super::*;
    use crate::reconciler::{BulkSnapshot, Incremental, Reconciler, Update};

    fn reconcile(tasks: Vec<Task>) -> Reconciler {
        let mut r = Reconciler::new();
        for task in tasks {
            r.apply(Update::Incremental(Incremental::Task(task)));
        }
        r
    }

    fn pending(id: &str, priority: Priority) -> Task {
        Task::new(id, id).with_priority(priority)
    }

    #[test]
    fn queue_is_sorted_by_priority_then_arrival() {
        let r = reconcile(vec![
            pending("a", Priority::MEDIUM),
            pending("b", Priority::LOW),
            pending("c", Priority::MEDIUM),
            pending("d", Priority::CRITICAL),
            Task::new("e", "e").with_status(TaskStatus::Running),
        ]);
        let snap = r.snapshot();
        let ids: Vec<_> = priority_queue(&snap, PRIORITY_QUEUE_LEN)
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(ids, ["d", "a", "c", "b"]);
    }

    #[test]
    fn queue_priorities_are_non_decreasing_for_any_mix() {
        let levels = [5u8, 1, 3, 3, 2, 5, 4, 1, 2, 3, 4, 5, 1];
        let tasks = levels
            .iter()
            .enumerate()
            .map(|(i, p)| pending(&format!("t{i}"), Priority::new(*p).unwrap()))
            .collect();
        let r = reconcile(tasks);
        let snap = r.snapshot();
        let queue = priority_queue(&snap, usize::MAX);
        assert_eq!(queue.len(), levels.len());
        for pair in queue.windows(2) {
            assert!(pair[0].priority <= pair[1].priority);
            if pair[0].priority == pair[1].priority {
                let a = &snap.tasks[&pair[0].id];
                let b = &snap.tasks[&pair[1].id];
                assert!(a.first_seen < b.first_seen);
            }
        }
    }

    #[test]
    fn queue_truncates() {
        let tasks = (0..15).map(|i| pending(&format!("t{i}"), Priority::MEDIUM)).collect();
        let r = reconcile(tasks);
        assert_eq!(priority_queue(&r.snapshot(), PRIORITY_QUEUE_LEN).len(), 10);
    }

    #[test]
    fn timeline_clips_to_window_and_floors_width() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        // Started 15s ago, still running: covers the second half.
        let mut half = Task::new("half", "half").with_status(TaskStatus::Running);
        half.started_at = Some(now - ChronoDuration::seconds(15));

        // Started a minute ago: clipped to the window start.
        let mut long = Task::new("long", "long").with_status(TaskStatus::Running);
        long.started_at = Some(now - ChronoDuration::seconds(60));

        // Tiny interval: floored to the minimum width.
        let mut blip = Task::new("blip", "blip").with_status(TaskStatus::Completed);
        blip.started_at = Some(now - ChronoDuration::seconds(10));
        blip.ended_at = Some(now - ChronoDuration::milliseconds(9_900));

        // Ended before the window opened: excluded.
        let mut old = Task::new("old", "old").with_status(TaskStatus::Completed);
        old.started_at = Some(now - ChronoDuration::seconds(90));
        old.ended_at = Some(now - ChronoDuration::seconds(45));

        // Never started: excluded.
        let queued = Task::new("queued", "queued");

        let r = reconcile(vec![half, long, blip, old, queued]);
        let bars = timeline(&r.snapshot(), now, TIMELINE_WINDOW, TIMELINE_ROWS);

        let ids: Vec<_> = bars.iter().map(|b| b.task_id.as_str()).collect();
        assert_eq!(ids, ["half", "long", "blip"]);

        assert!((bars[0].offset - 50.0).abs() < 1e-9);
        assert!((bars[0].width - 50.0).abs() < 1e-9);
        assert_eq!(bars[1].offset, 0.0);
        assert!((bars[1].width - 100.0).abs() < 1e-9);
        assert_eq!(bars[2].width, MIN_BAR_WIDTH);
    }

    #[test]
    fn timeline_keeps_last_rows() {
        let now = Utc::now();
        let tasks = (0..12)
            .map(|i| {
                let mut t = Task::new(format!("t{i}"), "x").with_status(TaskStatus::Running);
                t.started_at = Some(now - ChronoDuration::seconds(5));
                t
            })
            .collect();
        let r = reconcile(tasks);
        let bars = timeline(&r.snapshot(), now, TIMELINE_WINDOW, TIMELINE_ROWS);
        assert_eq!(bars.len(), 10);
        assert_eq!(bars[0].task_id, "t2");
    }

    #[test]
    fn completion_rate_boundaries() {
        assert_eq!(completion_rate(0, 0), 0.0);
        assert_eq!(completion_rate(4, 1), 25.0);
        assert_eq!(completion_rate(3, 1), 33.3);
        assert_eq!(completion_rate(3, 2), 66.7);
    }

    #[test]
    fn aggregate_counts_statuses_and_assigned_completion() {
        let mut done = Task::new("a", "a").with_status(TaskStatus::Completed);
        done.assignee = Some("employee-1".into());
        let mut failed = Task::new("b", "b").with_status(TaskStatus::Failed);
        failed.assignee = Some("employee-1".into());
        let mut running = Task::new("c", "c").with_status(TaskStatus::Running);
        running.assignee = Some("employee-2".into());
        let mut also_running = running.clone();
        also_running.id = "d".into();
        let unassigned = Task::new("e", "e");

        let r = reconcile(vec![done, failed, running, also_running, unassigned]);
        let stats = aggregate(&r.snapshot());
        assert_eq!(stats.counts.completed, 1);
        assert_eq!(stats.counts.running, 2);
        assert_eq!(stats.counts.total(), 5);
        assert_eq!(stats.assigned, 4);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.completion_rate, 25.0);
    }

    #[test]
    fn worker_labels() {
        let mut r = Reconciler::new();
        let mut employee = Worker::employee("employee-3", "Sam", false);
        employee.counters.total_assigned = 4;
        employee.counters.total_completed = 1;
        r.apply(Update::BulkSnapshot(BulkSnapshot {
            workers: vec![
                Worker::node("worker-1", WorkerStatus::Recovering),
                employee,
                Worker::node("worker-2", WorkerStatus::Active),
            ],
            ..Default::default()
        }));

        let summaries = worker_summaries(&r.snapshot());
        let labels: Vec<_> = summaries.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, ["Recovering", "Idle", "Working"]);
        assert_eq!(summaries[1].completion_rate, 25.0);
    }
}
