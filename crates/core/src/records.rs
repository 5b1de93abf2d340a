//! Wire records exchanged with the backend and their mapping onto the
//! domain model.
//!
//! The backend serializes its entities with camelCase keys and zone-less
//! local date-times. Records here are deliberately lenient: unknown keys are
//! ignored and most fields default when absent.

use serde::{Deserialize, Serialize};

use crate::log::{LogEntry, LogType};
use crate::role::{Actor, Role};
use crate::stats::EmployeeStats;
use crate::task::{Priority, Task, TaskPatch, TaskStatus};
use crate::types::{employee_worker_id, ActorId, LogId, Timestamp};
use crate::worker::{Worker, WorkerCounters, WorkerStatus};

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Lenient timestamp parsing for backend date-times.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    use crate::types::Timestamp;

    /// Parse RFC 3339, or a zone-less local date-time interpreted as UTC.
    pub fn parse(raw: &str) -> Option<Timestamp> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) if s.is_empty() => Ok(None),
            Some(s) => parse(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {s}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Reference to a backend user embedded in another record.
#[derive(Debug, Clone, Deserialize)]
pub struct UserRef {
    pub id: ActorId,
}

/// Task entity as returned by the REST endpoints and `task.*` push topics.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub task_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub progress: Option<i64>,
    #[serde(default)]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<UserRef>,
    #[serde(default)]
    pub retry_count: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub completion_message: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub start_time: Option<Timestamp>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub end_time: Option<Timestamp>,
}

impl From<TaskRecord> for Task {
    fn from(r: TaskRecord) -> Self {
        let assignee = r
            .worker_id
            .or_else(|| r.assigned_to.map(|user| employee_worker_id(user.id)));
        Task {
            id: r.task_id,
            name: r.name.unwrap_or_default(),
            description: r.description,
            priority: r.priority.map(Priority::clamped).unwrap_or_default(),
            status: r.status,
            progress: r.progress.unwrap_or(0).clamp(0, 100) as u8,
            assignee,
            retry_count: r.retry_count.unwrap_or(0).max(0) as u32,
            completion_message: r.completion_message,
            error_message: r.error_message,
            started_at: r.start_time,
            ended_at: r.end_time,
        }
    }
}

/// Payload of a `TASK_ASSIGNED` push message.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRecord {
    pub task_id: String,
    #[serde(default)]
    pub task_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub employee_id: Option<ActorId>,
    #[serde(default)]
    pub employee_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl AssignmentRecord {
    /// Assignment moves the task to RUNNING under the employee.
    pub fn into_patch(self, at: Option<Timestamp>) -> TaskPatch {
        TaskPatch {
            name: self.task_name,
            description: self.description,
            priority: self.priority.map(Priority::clamped),
            status: Some(TaskStatus::Running),
            assignee: self.employee_id.map(employee_worker_id),
            started_at: at,
            ..TaskPatch::new(self.task_id)
        }
    }
}

/// Payload of `TASK_COMPLETED` / `TASK_FAILED` push messages.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub task_id: String,
    #[serde(default)]
    pub task_name: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub employee_id: Option<ActorId>,
    #[serde(default)]
    pub employee_name: Option<String>,
}

impl CompletionRecord {
    /// `fallback` is the status implied by the message tag; an explicit
    /// terminal `status` in the payload wins.
    pub fn into_patch(self, fallback: TaskStatus, at: Option<Timestamp>) -> TaskPatch {
        let status = self.status.filter(|s| s.is_terminal()).unwrap_or(fallback);
        let (completion_message, error_message, progress) = match status {
            TaskStatus::Completed => (self.comment, None, Some(100)),
            _ => (None, self.comment, None),
        };
        TaskPatch {
            name: self.task_name,
            status: Some(status),
            progress,
            assignee: self.employee_id.map(employee_worker_id),
            completion_message,
            error_message,
            ended_at: at,
            ..TaskPatch::new(self.task_id)
        }
    }
}

// ---------------------------------------------------------------------------
// Workers
// ---------------------------------------------------------------------------

/// Generic worker node record (`/workers`, `worker.*` topics).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRecord {
    pub worker_id: String,
    pub status: WorkerStatus,
    #[serde(default)]
    pub tasks_processed: Option<u64>,
    #[serde(default)]
    pub current_task_id: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub last_heartbeat: Option<Timestamp>,
}

impl From<WorkerRecord> for Worker {
    fn from(r: WorkerRecord) -> Self {
        let mut worker = Worker::node(r.worker_id, r.status);
        worker.counters.tasks_processed = r.tasks_processed.unwrap_or(0);
        worker.current_task = r.current_task_id;
        worker.last_heartbeat = r.last_heartbeat;
        worker.normalized()
    }
}

/// Employee record from `/admin/employees`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRecord {
    pub id: ActorId,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub stats: EmployeeStats,
}

impl From<EmployeeRecord> for Worker {
    fn from(r: EmployeeRecord) -> Self {
        let name = r
            .full_name
            .or(r.username)
            .unwrap_or_else(|| r.id.to_string());
        employee_worker(employee_worker_id(r.id), name, &r.stats)
    }
}

/// Build the worker view of an employee from its statistics block.
pub fn employee_worker(id: String, name: String, stats: &EmployeeStats) -> Worker {
    let mut worker = Worker::employee(id, name, stats.is_working);
    worker.counters = WorkerCounters {
        tasks_processed: stats.total_completed + stats.total_failed,
        total_assigned: stats.total_assigned,
        total_completed: stats.total_completed,
        total_failed: stats.total_failed,
    };
    worker.average_time_minutes = Some(stats.average_time_minutes);
    worker
}

// ---------------------------------------------------------------------------
// Logs
// ---------------------------------------------------------------------------

/// System log row (`/logs`, `logs` topic).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    #[serde(default)]
    pub id: Option<LogId>,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default = "default_log_type")]
    pub kind: LogType,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub worker_id: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub timestamp: Option<Timestamp>,
}

fn default_log_type() -> LogType {
    LogType::Info
}

impl From<LogRecord> for LogEntry {
    fn from(r: LogRecord) -> Self {
        LogEntry {
            id: r.id,
            kind: r.kind,
            message: r.message,
            task_id: r.task_id,
            worker_id: r.worker_id,
            timestamp: r.timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// Employee dashboard and actions
// ---------------------------------------------------------------------------

/// Response of `GET /employee/tasks/dashboard`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDashboardRecord {
    #[serde(default)]
    pub current_task: Option<TaskRecord>,
    #[serde(default)]
    pub stats: EmployeeStats,
    #[serde(default)]
    pub recent_tasks: Vec<TaskRecord>,
}

/// Response of `POST /employee/tasks/get-next`: either a task or a
/// `{"message": "..."}` notice.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NextTaskRecord {
    Task(TaskRecord),
    Notice { message: String },
}

/// User record returned by the auth endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: ActorId,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub role: String,
}

impl TryFrom<UserRecord> for Actor {
    type Error = crate::error::CoreError;

    fn try_from(r: UserRecord) -> Result<Self, Self::Error> {
        let role: Role = r.role.parse()?;
        Ok(Actor {
            id: r.id,
            full_name: r.full_name.unwrap_or_else(|| r.username.clone()),
            username: r.username,
            role,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
