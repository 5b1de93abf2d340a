//! User-initiated mutating actions.
//!
//! Input is validated locally first; nothing is sent when validation fails.
//! A successful response that carries a task is admitted into the
//! reconciler as a push-equivalent update, then an immediate refresh is
//! requested. Failures carry a message fit to show the user and are never
//! fatal to the session.

use std::sync::Arc;

use taskboard_api::requests::{NewTask, NextTask};
use taskboard_api::{ApiError, TaskboardApi};
use taskboard_core::error::CoreError;
use taskboard_core::role::{Role, RoleProfile};
use taskboard_core::task::{Task, TaskPatch};
use taskboard_core::validation::{
    validate_comment, validate_description, validate_priority, validate_progress,
    validate_task_name,
};
use tokio::sync::{mpsc, Notify};

use crate::reconciler::Incremental;

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// Rejected locally; no request was sent.
    #[error(transparent)]
    Validation(#[from] CoreError),

    /// The request failed. `message` is the server's error text when it
    /// sent one, else a generic fallback.
    #[error("{message}")]
    Failed { message: String },
}

impl ActionError {
    fn from_api(error: ApiError, fallback: &str) -> Self {
        tracing::warn!(error = %error, "{fallback}");
        ActionError::Failed {
            message: error.user_message(fallback),
        }
    }
}

/// Input for task creation. Operators send `name` and `payload`; admins
/// send `name`, `description` and `priority`.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub name: String,
    pub description: String,
    pub priority: u8,
    pub payload: serde_json::Value,
}

impl TaskDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            priority: 3,
            payload: serde_json::json!({}),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    fn into_request(self, role: Role) -> Result<NewTask, CoreError> {
        validate_task_name(&self.name)?;
        match role {
            Role::Admin => {
                validate_description(&self.description)?;
                let priority = validate_priority(self.priority)?;
                Ok(NewTask::Assignment {
                    name: self.name.trim().to_string(),
                    description: self.description.trim().to_string(),
                    priority,
                })
            }
            Role::Operator => Ok(NewTask::Job {
                name: self.name.trim().to_string(),
                payload: self.payload.to_string(),
            }),
            Role::Employee => Err(CoreError::Validation(
                "Employees cannot create tasks".to_string(),
            )),
        }
    }
}

/// Cloneable entry point for user actions.
#[derive(Clone)]
pub struct Actions {
    api: TaskboardApi,
    profile: Arc<RoleProfile>,
    admit: mpsc::UnboundedSender<Incremental>,
    refresh: Arc<Notify>,
}

impl Actions {
    pub fn new(
        api: TaskboardApi,
        profile: Arc<RoleProfile>,
        admit: mpsc::UnboundedSender<Incremental>,
        refresh: Arc<Notify>,
    ) -> Self {
        Self {
            api,
            profile,
            admit,
            refresh,
        }
    }

    pub async fn create_task(&self, draft: TaskDraft) -> Result<Task, ActionError> {
        let request = draft.into_request(self.profile.role)?;
        let path = self.profile.endpoints.create_task.ok_or_else(|| {
            CoreError::Validation("This dashboard cannot create tasks".to_string())
        })?;

        let task = self
            .api
            .create_task(path, &request)
            .await
            .map_err(|e| ActionError::from_api(e, "Failed to create task"))?;

        tracing::info!(task_id = %task.id, name = %task.name, "Task created");
        self.admit_task(task.clone());
        Ok(task)
    }

    /// Ask the backend for the next task. A "nothing available" notice is a
    /// successful outcome, not an error.
    pub async fn get_next_task(&self) -> Result<NextTask, ActionError> {
        self.require_employee()?;
        let next = self
            .api
            .get_next_task()
            .await
            .map_err(|e| ActionError::from_api(e, "Failed to get next task"))?;

        match &next {
            NextTask::Assigned(task) => {
                tracing::info!(task_id = %task.id, "Next task assigned");
                self.admit_task(task.clone());
            }
            NextTask::Unavailable(message) => {
                tracing::info!(notice = %message, "No task available");
            }
        }
        Ok(next)
    }

    pub async fn update_progress(&self, task_id: &str, progress: u8) -> Result<(), ActionError> {
        self.require_employee()?;
        validate_progress(progress)?;
        self.api
            .update_progress(task_id, progress)
            .await
            .map_err(|e| ActionError::from_api(e, "Failed to update progress"))?;

        self.admit(Incremental::TaskPatch(TaskPatch {
            progress: Some(progress),
            ..TaskPatch::new(task_id)
        }));
        Ok(())
    }

    pub async fn complete_task(&self, task_id: &str, comment: &str) -> Result<Task, ActionError> {
        self.require_employee()?;
        validate_comment(comment, "completion comments")?;
        let task = self
            .api
            .complete_task(task_id, comment.trim())
            .await
            .map_err(|e| ActionError::from_api(e, "Failed to complete task"))?;
        self.admit_task(task.clone());
        Ok(task)
    }

    pub async fn fail_task(&self, task_id: &str, reason: &str) -> Result<Task, ActionError> {
        self.require_employee()?;
        validate_comment(reason, "a reason for failure")?;
        let task = self
            .api
            .fail_task(task_id, reason.trim())
            .await
            .map_err(|e| ActionError::from_api(e, "Failed to mark task as failed"))?;
        self.admit_task(task.clone());
        Ok(task)
    }

    fn require_employee(&self) -> Result<(), CoreError> {
        if self.profile.role == Role::Employee {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "Only employees can work on tasks (signed in as {})",
                self.profile.role
            )))
        }
    }

    fn admit_task(&self, task: Task) {
        self.admit(Incremental::Task(task));
    }

    fn admit(&self, update: Incremental) {
        if self.admit.send(update).is_err() {
            tracing::debug!("Dashboard runtime stopped; action result not admitted");
        }
        self.refresh.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use taskboard_core::role::Actor;

    use super::*;

    fn actions(role: Role) -> (Actions, mpsc::UnboundedReceiver<Incremental>) {
        let actor = Actor {
            role,
            ..Actor::operator()
        };
        let (tx, rx) = mpsc::unbounded_channel();
        // Nothing listens here: any request that slipped past validation
        // would fail with a transport error instead of a validation error.
        let api = TaskboardApi::new("http://127.0.0.1:9/api".into());
        let profile = Arc::new(RoleProfile::for_actor(&actor));
        (Actions::new(api, profile, tx, Arc::new(Notify::new())), rx)
    }

    #[tokio::test]
    async fn blank_comment_is_rejected_locally() {
        let (actions, mut admitted) = actions(Role::Employee);
        let err = actions.complete_task("t-1", "  ").await.unwrap_err();
        assert_matches!(err, ActionError::Validation(CoreError::Validation(_)));
        assert_eq!(
            err.to_string(),
            "Validation failed: Please provide completion comments before submitting"
        );
        assert!(admitted.try_recv().is_err());
    }

    #[tokio::test]
    async fn out_of_range_progress_is_rejected_locally() {
        let (actions, _rx) = actions(Role::Employee);
        assert_matches!(
            actions.update_progress("t-1", 101).await,
            Err(ActionError::Validation(_))
        );
    }

    #[tokio::test]
    async fn admin_draft_requires_description_and_priority() {
        let (actions, _rx) = actions(Role::Admin);
        assert_matches!(
            actions.create_task(TaskDraft::new("Audit")).await,
            Err(ActionError::Validation(_))
        );
        assert_matches!(
            actions
                .create_task(TaskDraft::new("Audit").with_description("q3").with_priority(9))
                .await,
            Err(ActionError::Validation(_))
        );
    }

    #[tokio::test]
    async fn employee_cannot_create_and_operator_cannot_complete() {
        let (employee, _rx) = actions(Role::Employee);
        assert_matches!(
            employee.create_task(TaskDraft::new("x")).await,
            Err(ActionError::Validation(_))
        );
        let (operator, _rx) = actions(Role::Operator);
        assert_matches!(
            operator.complete_task("t-1", "done").await,
            Err(ActionError::Validation(_))
        );
    }

    #[tokio::test]
    async fn transport_failure_uses_fallback_message() {
        let (actions, _rx) = actions(Role::Operator);
        let err = actions.create_task(TaskDraft::new("Export")).await.unwrap_err();
        assert_matches!(err, ActionError::Failed { ref message } if message == "Failed to create task");
    }

    #[test]
    fn operator_draft_serializes_payload() {
        let request = TaskDraft::new(" Export ")
            .with_payload(serde_json::json!({"data": "sample payload"}))
            .into_request(Role::Operator)
            .unwrap();
        assert_eq!(
            request,
            NewTask::Job {
                name: "Export".into(),
                payload: r#"{"data":"sample payload"}"#.into(),
            }
        );
    }
}
