//! Push channel envelope and message parser.
//!
//! The backend sends JSON frames shaped `{"type": "<kind>", "payload": {...}}`,
//! optionally with a `timestamp`. Generic dashboards receive dotted kinds
//! (`task.completed`); role-scoped queues receive upper-case tags
//! (`TASK_COMPLETED`). This module turns both into a typed [`PushMessage`].

use serde::Deserialize;
use taskboard_core::log::LogEntry;
use taskboard_core::message_types::*;
use taskboard_core::records::{
    timestamp, AssignmentRecord, CompletionRecord, LogRecord, TaskRecord, WorkerRecord,
};
use taskboard_core::task::{Task, TaskPatch, TaskStatus};
use taskboard_core::types::Timestamp;
use taskboard_core::worker::Worker;

/// Raw frame as it arrives on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl Envelope {
    pub fn sent_at(&self) -> Option<Timestamp> {
        self.timestamp.as_deref().and_then(timestamp::parse)
    }
}

/// Which step of the task lifecycle a full task record reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskLifecycle {
    Created,
    Started,
    Progress,
    Completed,
    Failed,
}

/// All known push messages.
#[derive(Debug, Clone)]
pub enum PushMessage {
    /// `task.*` topics carry the full task record.
    Task { stage: TaskLifecycle, task: Task },

    /// `worker.*` topics carry the full worker record.
    Worker(Worker),

    /// One system log line.
    Log(LogEntry),

    /// `TASK_ASSIGNED` to the receiving employee.
    TaskAssigned(TaskPatch),

    /// `TASK_ASSIGNED_BROADCAST` on the admin topic.
    TaskAssignedBroadcast(TaskPatch),

    /// `TASK_COMPLETED`.
    TaskCompleted(TaskPatch),

    /// `TASK_FAILED`.
    TaskFailed(TaskPatch),
}

impl PushMessage {
    /// Role-scoped notices only carry part of the task and prompt a refresh.
    pub fn is_role_scoped(&self) -> bool {
        matches!(
            self,
            PushMessage::TaskAssigned(_)
                | PushMessage::TaskAssignedBroadcast(_)
                | PushMessage::TaskCompleted(_)
                | PushMessage::TaskFailed(_)
        )
    }
}

/// Why a frame was dropped.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame is not a JSON envelope.
    #[error("malformed frame: {0}")]
    Malformed(serde_json::Error),

    /// The envelope parsed but its type is not one we handle.
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// The payload does not match the shape its type implies.
    #[error("invalid payload for {kind}: {source}")]
    Payload {
        kind: String,
        source: serde_json::Error,
    },
}

/// Parse one text frame into a typed message.
///
/// Callers should log the error and keep the connection open.
pub fn parse_frame(text: &str) -> Result<PushMessage, FrameError> {
    let envelope: Envelope = serde_json::from_str(text).map_err(FrameError::Malformed)?;
    classify(envelope)
}

/// Map an envelope to a typed message based on its `type`.
pub fn classify(envelope: Envelope) -> Result<PushMessage, FrameError> {
    let at = envelope.sent_at();
    let Envelope { kind, payload, .. } = envelope;

    let stage = match kind.as_str() {
        MSG_TYPE_TASK_CREATED => Some(TaskLifecycle::Created),
        MSG_TYPE_TASK_STARTED => Some(TaskLifecycle::Started),
        MSG_TYPE_TASK_PROGRESS => Some(TaskLifecycle::Progress),
        MSG_TYPE_TASK_COMPLETED => Some(TaskLifecycle::Completed),
        MSG_TYPE_TASK_FAILED => Some(TaskLifecycle::Failed),
        _ => None,
    };
    if let Some(stage) = stage {
        let record: TaskRecord = decode(&kind, payload)?;
        return Ok(PushMessage::Task {
            stage,
            task: record.into(),
        });
    }

    match kind.as_str() {
        MSG_TYPE_WORKER_REGISTERED | MSG_TYPE_WORKER_UPDATED | MSG_TYPE_WORKER_FAILED => {
            let record: WorkerRecord = decode(&kind, payload)?;
            Ok(PushMessage::Worker(record.into()))
        }
        MSG_TYPE_LOG => {
            let record: LogRecord = decode(&kind, payload)?;
            Ok(PushMessage::Log(record.into()))
        }
        MSG_TAG_TASK_ASSIGNED => {
            let record: AssignmentRecord = decode(&kind, payload)?;
            Ok(PushMessage::TaskAssigned(record.into_patch(at)))
        }
        MSG_TAG_TASK_ASSIGNED_BROADCAST => {
            let record: AssignmentRecord = decode(&kind, payload)?;
            Ok(PushMessage::TaskAssignedBroadcast(record.into_patch(at)))
        }
        MSG_TAG_TASK_COMPLETED => {
            let record: CompletionRecord = decode(&kind, payload)?;
            Ok(PushMessage::TaskCompleted(
                record.into_patch(TaskStatus::Completed, at),
            ))
        }
        MSG_TAG_TASK_FAILED => {
            let record: CompletionRecord = decode(&kind, payload)?;
            Ok(PushMessage::TaskFailed(record.into_patch(TaskStatus::Failed, at)))
        }
        _ => Err(FrameError::UnknownType(kind)),
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    kind: &str,
    payload: serde_json::Value,
) -> Result<T, FrameError> {
    serde_json::from_value(payload).map_err(|source| FrameError::Payload {
        kind: kind.to_string(),
        source,
    })
}
