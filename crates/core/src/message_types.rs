//! Push channel message type constants.
//!
//! Dotted types are published on the generic operator topics; the
//! upper-case tags are published on role-scoped admin and employee queues.

pub const MSG_TYPE_TASK_CREATED: &str = "task.created";
pub const MSG_TYPE_TASK_STARTED: &str = "task.started";
pub const MSG_TYPE_TASK_PROGRESS: &str = "task.progress";
pub const MSG_TYPE_TASK_COMPLETED: &str = "task.completed";
pub const MSG_TYPE_TASK_FAILED: &str = "task.failed";

pub const MSG_TYPE_WORKER_REGISTERED: &str = "worker.registered";
pub const MSG_TYPE_WORKER_UPDATED: &str = "worker.updated";
pub const MSG_TYPE_WORKER_FAILED: &str = "worker.failed";

/// System log line.
pub const MSG_TYPE_LOG: &str = "logs";

/// A task was assigned to the receiving employee.
pub const MSG_TAG_TASK_ASSIGNED: &str = "TASK_ASSIGNED";

/// Admin-side broadcast of any assignment.
pub const MSG_TAG_TASK_ASSIGNED_BROADCAST: &str = "TASK_ASSIGNED_BROADCAST";

pub const MSG_TAG_TASK_COMPLETED: &str = "TASK_COMPLETED";
pub const MSG_TAG_TASK_FAILED: &str = "TASK_FAILED";
