//! Request bodies and mapped responses for the mutating endpoints.

use serde::Serialize;
use taskboard_core::records::EmployeeDashboardRecord;
use taskboard_core::stats::EmployeeStats;
use taskboard_core::task::{Priority, Task};

/// Body of a task creation request. The shape depends on the role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum NewTask {
    /// Operator dashboard: `POST /tasks {name, payload}`.
    Job { name: String, payload: String },

    /// Admin dashboard: `POST /admin/tasks {name, description, priority}`.
    Assignment {
        name: String,
        description: String,
        priority: Priority,
    },
}

impl NewTask {
    pub fn name(&self) -> &str {
        match self {
            NewTask::Job { name, .. } | NewTask::Assignment { name, .. } => name,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ProgressBody {
    pub progress: u8,
}

#[derive(Debug, Serialize)]
pub(crate) struct CommentBody<'a> {
    pub message: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginBody<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Result of asking for the next task.
#[derive(Debug, Clone, PartialEq)]
pub enum NextTask {
    Assigned(Task),
    /// The backend had nothing to hand out; carries its notice text.
    Unavailable(String),
}

/// The employee's own dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeDashboard {
    pub current_task: Option<Task>,
    pub stats: EmployeeStats,
    pub recent_tasks: Vec<Task>,
}

impl From<EmployeeDashboardRecord> for EmployeeDashboard {
    fn from(r: EmployeeDashboardRecord) -> Self {
        Self {
            current_task: r.current_task.map(Task::from),
            stats: r.stats,
            recent_tasks: r.recent_tasks.into_iter().map(Task::from).collect(),
        }
    }
}
