//! Worker nodes and employees, unified under one model.

use serde::{Deserialize, Serialize};

use crate::types::{TaskId, Timestamp, WorkerId};

/// Status reported for generic worker nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerStatus {
    Active,
    Idle,
    Failed,
    Recovering,
}

/// How a worker reports whether it is busy.
///
/// Worker nodes carry a status; employees only carry an `isWorking` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Availability {
    Node(WorkerStatus),
    Employee { is_working: bool },
}

impl Availability {
    pub fn is_working(self) -> bool {
        match self {
            Availability::Node(status) => status == WorkerStatus::Active,
            Availability::Employee { is_working } => is_working,
        }
    }
}

/// Lifetime counters. They only grow over an observed session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerCounters {
    pub tasks_processed: u64,
    pub total_assigned: u64,
    pub total_completed: u64,
    pub total_failed: u64,
}

impl WorkerCounters {
    /// Field-wise maximum, so a stale report never rolls a counter back.
    pub fn max(self, other: WorkerCounters) -> WorkerCounters {
        WorkerCounters {
            tasks_processed: self.tasks_processed.max(other.tasks_processed),
            total_assigned: self.total_assigned.max(other.total_assigned),
            total_completed: self.total_completed.max(other.total_completed),
            total_failed: self.total_failed.max(other.total_failed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Worker {
    pub id: WorkerId,
    /// Display name (full name for employees, the id for worker nodes).
    pub name: String,
    pub availability: Availability,
    pub counters: WorkerCounters,
    pub current_task: Option<TaskId>,
    pub last_heartbeat: Option<Timestamp>,
    pub average_time_minutes: Option<f64>,
}

impl Worker {
    pub fn node(id: impl Into<WorkerId>, status: WorkerStatus) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            availability: Availability::Node(status),
            counters: WorkerCounters::default(),
            current_task: None,
            last_heartbeat: None,
            average_time_minutes: None,
        }
    }

    pub fn employee(id: impl Into<WorkerId>, name: impl Into<String>, is_working: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            availability: Availability::Employee { is_working },
            counters: WorkerCounters::default(),
            current_task: None,
            last_heartbeat: None,
            average_time_minutes: None,
        }
    }

    /// A worker holding a task is working. An idle node or a non-working
    /// employee that reports a current task is promoted accordingly.
    pub fn normalized(mut self) -> Self {
        if self.current_task.is_some() {
            self.availability = match self.availability {
                Availability::Node(WorkerStatus::Idle) => Availability::Node(WorkerStatus::Active),
                Availability::Employee { .. } => Availability::Employee { is_working: true },
                other => other,
            };
        }
        self
    }

    /// Replace this record with `incoming`, keeping counters and heartbeat
    /// from moving backwards.
    pub fn merged_with(&self, incoming: Worker) -> Worker {
        let mut merged = incoming.normalized();
        merged.counters = self.counters.max(merged.counters);
        merged.last_heartbeat = match (self.last_heartbeat, merged.last_heartbeat) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => b.or(a),
        };
        merged
    }
}
