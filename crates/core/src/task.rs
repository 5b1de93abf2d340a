//! Task model, status lifecycle and partial updates.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{TaskId, Timestamp, WorkerId};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a task as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Retrying,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::Running,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Retrying,
    ];

    /// Completed and failed tasks accept no further status transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Retrying => "RETRYING",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Fixed 5-level urgency scale: 1 is the most urgent, 5 the least.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const CRITICAL: Priority = Priority(1);
    pub const HIGH: Priority = Priority(2);
    pub const MEDIUM: Priority = Priority(3);
    pub const LOW: Priority = Priority(4);
    pub const VERY_LOW: Priority = Priority(5);

    pub fn new(value: u8) -> Result<Self, CoreError> {
        if (1..=5).contains(&value) {
            Ok(Self(value))
        } else {
            Err(CoreError::InvalidValue {
                field: "priority",
                value: value.to_string(),
            })
        }
    }

    /// Clamp an arbitrary backend value onto the scale.
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(1, 5) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "Critical",
            2 => "High",
            3 => "Medium",
            4 => "Low",
            _ => "Very Low",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::MEDIUM
    }
}

impl TryFrom<u8> for Priority {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Priority::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        p.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{} - {}", self.0, self.label())
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// Client-side view of one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub status: TaskStatus,
    /// 0-100, meaningful only while running.
    pub progress: u8,
    /// Owning worker or employee (`employee-{id}`).
    pub assignee: Option<WorkerId>,
    pub retry_count: u32,
    /// Set when the task completed.
    pub completion_message: Option<String>,
    /// Set when the task failed.
    pub error_message: Option<String>,
    pub started_at: Option<Timestamp>,
    /// Set once the task is terminal.
    pub ended_at: Option<Timestamp>,
}

impl Task {
    /// A freshly created, unassigned pending task.
    pub fn new(id: impl Into<TaskId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            priority: Priority::default(),
            status: TaskStatus::Pending,
            progress: 0,
            assignee: None,
            retry_count: 0,
            completion_message: None,
            error_message: None,
            started_at: None,
            ended_at: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Copy informational fields from `other` that this task does not know
    /// yet. Status, progress and retry count are left untouched.
    ///
    /// Returns `true` when anything changed.
    pub fn fill_informational(&mut self, other: &Task) -> bool {
        let mut changed = false;

        if self.name.is_empty() && !other.name.is_empty() {
            self.name = other.name.clone();
            changed = true;
        }
        changed |= fill(&mut self.description, &other.description);
        changed |= fill(&mut self.assignee, &other.assignee);
        changed |= fill(&mut self.started_at, &other.started_at);
        changed |= fill(&mut self.ended_at, &other.ended_at);

        match self.status {
            TaskStatus::Completed => {
                changed |= fill(&mut self.completion_message, &other.completion_message);
            }
            TaskStatus::Failed => {
                changed |= fill(&mut self.error_message, &other.error_message);
            }
            _ => {}
        }

        changed
    }
}

fn fill<T: Clone>(slot: &mut Option<T>, incoming: &Option<T>) -> bool {
    if slot.is_none() && incoming.is_some() {
        *slot = incoming.clone();
        true
    } else {
        false
    }
}

// ---------------------------------------------------------------------------
// TaskPatch
// ---------------------------------------------------------------------------

/// Partial task update carried by role-scoped push messages
/// (assignment and completion notices). `None` means "not mentioned".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub id: TaskId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    pub progress: Option<u8>,
    pub assignee: Option<WorkerId>,
    pub completion_message: Option<String>,
    pub error_message: Option<String>,
    pub started_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
}

impl TaskPatch {
    pub fn new(id: impl Into<TaskId>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Overlay every mentioned field onto `task`.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(name) = &self.name {
            task.name = name.clone();
        }
        if let Some(description) = &self.description {
            task.description = Some(description.clone());
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(progress) = self.progress {
            task.progress = progress.min(100);
        }
        if let Some(assignee) = &self.assignee {
            task.assignee = Some(assignee.clone());
        }
        if let Some(message) = &self.completion_message {
            task.completion_message = Some(message.clone());
        }
        if let Some(message) = &self.error_message {
            task.error_message = Some(message.clone());
        }
        if let Some(at) = self.started_at {
            task.started_at = Some(at);
        }
        if let Some(at) = self.ended_at {
            task.ended_at = Some(at);
        }
    }

    /// Materialize a task the client has never seen before.
    pub fn into_task(self) -> Task {
        let mut task = Task::new(self.id.clone(), String::new());
        self.apply_to(&mut task);
        task
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::Retrying.is_terminal());
    }

    #[test]
    fn status_uses_backend_spelling() {
        let json = serde_json::to_string(&TaskStatus::Retrying).unwrap();
        assert_eq!(json, "\"RETRYING\"");
        let parsed: TaskStatus = serde_json::from_str("\"COMPLETED\"").unwrap();
        assert_eq!(parsed, TaskStatus::Completed);
    }

    #[test]
    fn priority_rejects_out_of_range() {
        assert_matches!(Priority::new(0), Err(CoreError::InvalidValue { field: "priority", .. }));
        assert_matches!(Priority::new(6), Err(CoreError::InvalidValue { .. }));
        assert_eq!(Priority::new(1).unwrap(), Priority::CRITICAL);
    }

    #[test]
    fn priority_clamps_backend_values() {
        assert_eq!(Priority::clamped(-4), Priority::CRITICAL);
        assert_eq!(Priority::clamped(42), Priority::VERY_LOW);
        assert_eq!(Priority::clamped(2), Priority::HIGH);
    }

    #[test]
    fn priority_labels() {
        assert_eq!(Priority::CRITICAL.to_string(), "P1 - Critical");
        assert_eq!(Priority::VERY_LOW.label(), "Very Low");
        assert!(Priority::CRITICAL < Priority::LOW);
    }

    #[test]
    fn patch_overlays_only_mentioned_fields() {
        let mut task = Task::new("t-1", "Resize images").with_priority(Priority::HIGH);
        let patch = TaskPatch {
            status: Some(TaskStatus::Running),
            assignee: Some("employee-4".into()),
            ..TaskPatch::new("t-1")
        };

        patch.apply_to(&mut task);

        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.assignee.as_deref(), Some("employee-4"));
        assert_eq!(task.name, "Resize images");
        assert_eq!(task.priority, Priority::HIGH);
    }

    #[test]
    fn patch_caps_progress() {
        let mut task = Task::new("t-1", "x");
        TaskPatch {
            progress: Some(140),
            ..TaskPatch::new("t-1")
        }
        .apply_to(&mut task);
        assert_eq!(task.progress, 100);
    }

    #[test]
    fn fill_informational_keeps_status_and_existing_values() {
        let mut done = Task::new("t-1", "Export").with_status(TaskStatus::Completed);
        done.completion_message = Some("done".into());

        let mut late = Task::new("t-1", "Export (renamed)").with_status(TaskStatus::Running);
        late.description = Some("nightly export".into());
        late.completion_message = Some("other".into());
        late.progress = 40;

        assert!(done.fill_informational(&late));
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.name, "Export");
        assert_eq!(done.description.as_deref(), Some("nightly export"));
        assert_eq!(done.completion_message.as_deref(), Some("done"));
        assert_eq!(done.progress, 0);

        // A second identical pass changes nothing.
        assert!(!done.fill_informational(&late));
    }
}
