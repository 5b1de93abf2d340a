use serde::{Deserialize, Serialize};

use crate::types::{LogId, TaskId, Timestamp, WorkerId};

/// Severity of a system log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogType {
    Info,
    Warning,
    Error,
    Success,
}

/// One line of the backend's system log stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LogEntry {
    /// Set for every line the backend persisted, pushed or polled.
    pub id: Option<LogId>,
    pub kind: LogType,
    pub message: String,
    pub task_id: Option<TaskId>,
    pub worker_id: Option<WorkerId>,
    pub timestamp: Option<Timestamp>,
}

impl LogEntry {
    pub fn new(kind: LogType, message: impl Into<String>) -> Self {
        Self {
            id: None,
            kind,
            message: message.into(),
            task_id: None,
            worker_id: None,
            timestamp: None,
        }
    }

    pub fn with_id(mut self, id: LogId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn for_task(mut self, task_id: impl Into<TaskId>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }
}
