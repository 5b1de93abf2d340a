//! Single writer of the client-side task and worker state.
//!
//! Push events and poll snapshots both arrive here as an [`Update`]. Each
//! entity is `Unknown` until first observed, then `Known` and merged on
//! every later observation:
//!
//! - A terminal task (COMPLETED / FAILED) only accepts informational fields.
//!   Anything that would change its status is discarded without error.
//! - A non-terminal task is replaced by the incoming record (last write by
//!   arrival wins). Progress never moves backwards while the task stays
//!   RUNNING under the same assignee.
//! - Workers are replaced, but their counters and heartbeat never regress.
//! - Poll snapshots never delete entities they do not mention.
//!
//! Listeners hear about admitted changes only; a no-op merge is silent.

use std::collections::HashMap;
use std::sync::Arc;

use taskboard_core::stats::TaskStatistics;
use taskboard_core::task::{Task, TaskPatch, TaskStatus};
use taskboard_core::types::{TaskId, WorkerId};
use taskboard_core::worker::Worker;

/// Arrival position of an entity's first observation.
pub type Seq = u64;

/// Which source produced an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Push,
    Poll,
}

/// A value plus the arrival position of its first observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Tracked<T> {
    pub value: T,
    pub first_seen: Seq,
}

/// One observation from the push channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Incremental {
    /// Full task record.
    Task(Task),
    /// Partial task record from a role-scoped notice.
    TaskPatch(TaskPatch),
    Worker(Worker),
}

/// One round of the poll fallback. Authoritative for what it names only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkSnapshot {
    pub tasks: Vec<Task>,
    pub workers: Vec<Worker>,
    pub statistics: Option<TaskStatistics>,
}

impl BulkSnapshot {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.workers.is_empty() && self.statistics.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Incremental(Incremental),
    BulkSnapshot(BulkSnapshot),
}

impl Update {
    fn source(&self) -> Source {
        match self {
            Update::Incremental(_) => Source::Push,
            Update::BulkSnapshot(_) => Source::Poll,
        }
    }
}

/// An admitted change.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Task {
        source: Source,
        /// `None` on first observation.
        previous: Option<Task>,
        current: Task,
    },
    Worker {
        source: Source,
        previous: Option<Worker>,
        current: Worker,
    },
    Statistics(TaskStatistics),
}

impl Change {
    /// `true` when this change moved a task into `status`.
    pub fn task_reached(&self, status: TaskStatus) -> bool {
        match self {
            Change::Task {
                previous, current, ..
            } => current.status == status && previous.as_ref().map(|p| p.status) != Some(status),
            _ => false,
        }
    }
}

/// Immutable view of the reconciled state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub tasks: HashMap<TaskId, Tracked<Task>>,
    pub workers: HashMap<WorkerId, Tracked<Worker>>,
    /// Server-reported counts from the last poll that carried them.
    pub statistics: Option<TaskStatistics>,
}

impl Snapshot {
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id).map(|t| &t.value)
    }

    pub fn worker(&self, id: &str) -> Option<&Worker> {
        self.workers.get(id).map(|w| &w.value)
    }

    /// Tasks ordered by first observation.
    pub fn tasks_by_arrival(&self) -> Vec<&Tracked<Task>> {
        let mut tasks: Vec<_> = self.tasks.values().collect();
        tasks.sort_by_key(|t| t.first_seen);
        tasks
    }

    pub fn workers_by_arrival(&self) -> Vec<&Tracked<Worker>> {
        let mut workers: Vec<_> = self.workers.values().collect();
        workers.sort_by_key(|w| w.first_seen);
        workers
    }
}

/// Handle returned by [`Reconciler::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&Change) + Send>;

pub struct Reconciler {
    state: Arc<Snapshot>,
    next_seq: Seq,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Snapshot::default()),
            next_seq: 0,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    /// The current state. Cheap: later merges copy on write.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.state)
    }

    /// Register a listener invoked once per admitted change.
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&Change) + Send + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns `false` if `id` was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Merge one update and notify listeners of what was admitted.
    pub fn apply(&mut self, update: Update) -> Vec<Change> {
        let source = update.source();
        let mut changes = Vec::new();

        match update {
            Update::Incremental(Incremental::Task(task)) => {
                changes.extend(self.merge_task(task, source));
            }
            Update::Incremental(Incremental::TaskPatch(patch)) => {
                changes.extend(self.merge_patch(patch));
            }
            Update::Incremental(Incremental::Worker(worker)) => {
                changes.extend(self.merge_worker(worker, source));
            }
            Update::BulkSnapshot(bulk) => {
                for task in bulk.tasks {
                    changes.extend(self.merge_task(task, source));
                }
                for worker in bulk.workers {
                    changes.extend(self.merge_worker(worker, source));
                }
                if let Some(stats) = bulk.statistics {
                    changes.extend(self.merge_statistics(stats));
                }
            }
        }

        for change in &changes {
            for (_, listener) in self.listeners.iter_mut() {
                listener(change);
            }
        }
        changes
    }

    fn next_seq(&mut self) -> Seq {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn merge_task(&mut self, incoming: Task, source: Source) -> Option<Change> {
        let Some(existing) = self.state.tasks.get(&incoming.id) else {
            let first_seen = self.next_seq();
            Arc::make_mut(&mut self.state).tasks.insert(
                incoming.id.clone(),
                Tracked {
                    value: incoming.clone(),
                    first_seen,
                },
            );
            return Some(Change::Task {
                source,
                previous: None,
                current: incoming,
            });
        };

        let previous = existing.value.clone();
        let merged = if previous.is_terminal() {
            if incoming.status != previous.status {
                tracing::debug!(
                    task_id = %previous.id,
                    held = %previous.status,
                    incoming = %incoming.status,
                    ?source,
                    "Discarding transition on terminal task",
                );
            }
            let mut merged = previous.clone();
            merged.fill_informational(&incoming);
            merged
        } else {
            let mut merged = incoming;
            if merged.status == TaskStatus::Running
                && previous.status == TaskStatus::Running
                && merged.assignee == previous.assignee
                && merged.progress < previous.progress
            {
                tracing::debug!(
                    task_id = %merged.id,
                    held = previous.progress,
                    incoming = merged.progress,
                    ?source,
                    "Keeping higher progress",
                );
                merged.progress = previous.progress;
            }
            merged
        };

        self.store_task(previous, merged, source)
    }

    fn merge_patch(&mut self, patch: TaskPatch) -> Option<Change> {
        let Some(existing) = self.state.task(&patch.id) else {
            return self.merge_task(patch.into_task(), Source::Push);
        };

        let previous = existing.clone();
        let mut overlay = previous.clone();
        patch.apply_to(&mut overlay);

        let merged = if previous.is_terminal() {
            if overlay.status != previous.status {
                tracing::debug!(
                    task_id = %previous.id,
                    held = %previous.status,
                    incoming = %overlay.status,
                    "Discarding transition on terminal task",
                );
            }
            let mut merged = previous.clone();
            merged.fill_informational(&overlay);
            merged
        } else {
            overlay
        };

        self.store_task(previous, merged, Source::Push)
    }

    fn store_task(&mut self, previous: Task, merged: Task, source: Source) -> Option<Change> {
        if merged == previous {
            return None;
        }
        if let Some(slot) = Arc::make_mut(&mut self.state).tasks.get_mut(&merged.id) {
            slot.value = merged.clone();
        }
        Some(Change::Task {
            source,
            previous: Some(previous),
            current: merged,
        })
    }

    fn merge_worker(&mut self, incoming: Worker, source: Source) -> Option<Change> {
        let Some(existing) = self.state.workers.get(&incoming.id) else {
            let current = incoming.normalized();
            let first_seen = self.next_seq();
            Arc::make_mut(&mut self.state).workers.insert(
                current.id.clone(),
                Tracked {
                    value: current.clone(),
                    first_seen,
                },
            );
            return Some(Change::Worker {
                source,
                previous: None,
                current,
            });
        };

        let previous = existing.value.clone();
        let merged = previous.merged_with(incoming);
        if merged == previous {
            return None;
        }
        if let Some(slot) = Arc::make_mut(&mut self.state).workers.get_mut(&merged.id) {
            slot.value = merged.clone();
        }
        Some(Change::Worker {
            source,
            previous: Some(previous),
            current: merged,
        })
    }

    fn merge_statistics(&mut self, stats: TaskStatistics) -> Option<Change> {
        if self.state.statistics == Some(stats) {
            return None;
        }
        Arc::make_mut(&mut self.state).statistics = Some(stats);
        Some(Change::Statistics(stats))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use taskboard_core::task::Priority;
    use taskboard_core::worker::{Availability, WorkerStatus};

    use super::*;

    fn push(task: Task) -> Update {
        Update::Incremental(Incremental::Task(task))
    }

    fn running(id: &str, progress: u8) -> Task {
        let mut task = Task::new(id, "Export").with_status(TaskStatus::Running);
        task.assignee = Some("worker-1".into());
        task.progress = progress;
        task
    }

    fn completed(id: &str, message: &str) -> Task {
        let mut task = running(id, 100).with_status(TaskStatus::Completed);
        task.completion_message = Some(message.into());
        task
    }

    #[test]
    fn first_observation_is_admitted() {
        let mut r = Reconciler::new();
        let changes = r.apply(push(Task::new("t-1", "Export")));
        assert_matches!(&changes[..], [Change::Task { previous: None, source: Source::Push, .. }]);
        assert_eq!(r.snapshot().task("t-1").unwrap().name, "Export");
    }

    #[test]
    fn identical_replay_is_silent() {
        let mut r = Reconciler::new();
        r.apply(push(running("t-1", 10)));
        let before = r.snapshot();
        assert!(r.apply(push(running("t-1", 10))).is_empty());
        assert_eq!(*r.snapshot(), *before);
    }

    #[test]
    fn non_terminal_task_is_replaced() {
        let mut r = Reconciler::new();
        r.apply(push(Task::new("t-1", "Export")));
        let mut renamed = running("t-1", 5);
        renamed.name = "Export v2".into();
        r.apply(push(renamed));
        let task = r.snapshot().task("t-1").cloned().unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.name, "Export v2");
    }

    #[test]
    fn progress_does_not_regress_under_same_assignment() {
        let mut r = Reconciler::new();
        r.apply(push(running("t-1", 70)));
        let changes = r.apply(Update::BulkSnapshot(BulkSnapshot {
            tasks: vec![running("t-1", 40)],
            ..Default::default()
        }));
        assert!(changes.is_empty());
        assert_eq!(r.snapshot().task("t-1").unwrap().progress, 70);

        // A new assignee restarts progress.
        let mut reassigned = running("t-1", 0);
        reassigned.assignee = Some("worker-2".into());
        r.apply(push(reassigned));
        assert_eq!(r.snapshot().task("t-1").unwrap().progress, 0);
    }

    #[test]
    fn terminal_status_is_final() {
        let mut r = Reconciler::new();
        r.apply(push(completed("t-1", "done")));

        let changes = r.apply(push(running("t-1", 30)));
        assert!(changes.is_empty());

        let mut failed = running("t-1", 0).with_status(TaskStatus::Failed);
        failed.error_message = Some("late failure".into());
        r.apply(Update::BulkSnapshot(BulkSnapshot {
            tasks: vec![failed],
            ..Default::default()
        }));

        let task = r.snapshot().task("t-1").cloned().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.completion_message.as_deref(), Some("done"));
        assert_eq!(task.error_message, None);
    }

    #[test]
    fn terminal_task_accepts_missing_informational_fields() {
        let mut r = Reconciler::new();
        let mut done = completed("t-1", "done");
        done.description = None;
        r.apply(push(done));

        let mut late = running("t-1", 50);
        late.description = Some("nightly export".into());
        let changes = r.apply(push(late));

        assert_eq!(changes.len(), 1);
        let task = r.snapshot().task("t-1").cloned().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.description.as_deref(), Some("nightly export"));
    }

    #[test]
    fn patch_overlays_known_task() {
        let mut r = Reconciler::new();
        r.apply(push(Task::new("t-1", "Audit").with_priority(Priority::HIGH)));
        r.apply(Update::Incremental(Incremental::TaskPatch(TaskPatch {
            status: Some(TaskStatus::Running),
            assignee: Some("employee-4".into()),
            ..TaskPatch::new("t-1")
        })));
        let task = r.snapshot().task("t-1").cloned().unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.priority, Priority::HIGH);
        assert_eq!(task.assignee.as_deref(), Some("employee-4"));
    }

    #[test]
    fn patch_cannot_reopen_terminal_task() {
        let mut r = Reconciler::new();
        r.apply(push(completed("t-1", "done")));
        let changes = r.apply(Update::Incremental(Incremental::TaskPatch(TaskPatch {
            status: Some(TaskStatus::Running),
            ..TaskPatch::new("t-1")
        })));
        assert!(changes.is_empty());
        assert_eq!(r.snapshot().task("t-1").unwrap().status, TaskStatus::Completed);
    }

    #[test]
    fn poll_never_deletes() {
        let mut r = Reconciler::new();
        r.apply(push(Task::new("t-1", "a")));
        r.apply(push(Task::new("t-2", "b")));
        r.apply(Update::BulkSnapshot(BulkSnapshot {
            tasks: vec![Task::new("t-2", "b")],
            ..Default::default()
        }));
        let snap = r.snapshot();
        assert_eq!(snap.tasks.len(), 2);
        assert_eq!(snap.task("t-1").unwrap().name, "a");
    }

    #[test]
    fn worker_counters_never_regress() {
        let mut r = Reconciler::new();
        let mut w = Worker::node("worker-1", WorkerStatus::Active);
        w.counters.tasks_processed = 10;
        r.apply(Update::Incremental(Incremental::Worker(w)));

        let mut stale = Worker::node("worker-1", WorkerStatus::Idle);
        stale.counters.tasks_processed = 8;
        r.apply(Update::BulkSnapshot(BulkSnapshot {
            workers: vec![stale],
            ..Default::default()
        }));

        let worker = r.snapshot().worker("worker-1").cloned().unwrap();
        assert_eq!(worker.counters.tasks_processed, 10);
        assert_eq!(worker.availability, Availability::Node(WorkerStatus::Idle));
    }

    #[test]
    fn statistics_notify_only_when_different() {
        let mut r = Reconciler::new();
        let stats = TaskStatistics {
            pending: 2,
            ..Default::default()
        };
        let bulk = BulkSnapshot {
            statistics: Some(stats),
            ..Default::default()
        };
        assert_eq!(r.apply(Update::BulkSnapshot(bulk.clone())), vec![Change::Statistics(stats)]);
        assert!(r.apply(Update::BulkSnapshot(bulk)).is_empty());
        assert_eq!(r.snapshot().statistics, Some(stats));
    }

    #[test]
    fn listeners_hear_admitted_changes_only() {
        let mut r = Reconciler::new();
        let heard = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&heard);
        let id = r.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        r.apply(push(completed("t-1", "done")));
        r.apply(push(completed("t-1", "done")));
        r.apply(push(running("t-1", 10)));
        assert_eq!(heard.load(Ordering::SeqCst), 1);

        assert!(r.unsubscribe(id));
        assert!(!r.unsubscribe(id));
        r.apply(push(Task::new("t-2", "b")));
        assert_eq!(heard.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn snapshot_is_unaffected_by_later_merges() {
        let mut r = Reconciler::new();
        r.apply(push(Task::new("t-1", "a")));
        let held = r.snapshot();
        r.apply(push(running("t-1", 20)));
        assert_eq!(held.task("t-1").unwrap().status, TaskStatus::Pending);
        assert_eq!(r.snapshot().task("t-1").unwrap().status, TaskStatus::Running);
    }

    #[test]
    fn arrival_order_follows_first_observation() {
        let mut r = Reconciler::new();
        r.apply(Update::BulkSnapshot(BulkSnapshot {
            tasks: vec![Task::new("b", "b"), Task::new("a", "a")],
            ..Default::default()
        }));
        r.apply(push(Task::new("c", "c")));
        r.apply(push(running("b", 1)));
        let order: Vec<_> = r
            .snapshot()
            .tasks_by_arrival()
            .iter()
            .map(|t| t.value.id.clone())
            .collect();
        assert_eq!(order, ["b", "a", "c"]);
    }

    #[test]
    fn task_reached_detects_transitions_only() {
        let mut r = Reconciler::new();
        r.apply(push(running("t-1", 90)));
        let changes = r.apply(push(completed("t-1", "done")));
        assert!(changes[0].task_reached(TaskStatus::Completed));
        assert!(!changes[0].task_reached(TaskStatus::Failed));
    }
}
