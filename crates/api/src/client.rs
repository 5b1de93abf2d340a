//! HTTP client for the backend REST endpoints.
//!
//! Read paths are passed in by the caller (they come from the role
//! profile); the employee action paths are fixed by the backend.

use std::time::Duration;

use taskboard_core::log::LogEntry;
use taskboard_core::records::{
    EmployeeDashboardRecord, EmployeeRecord, LogRecord, NextTaskRecord, TaskRecord, UserRecord,
    WorkerRecord,
};
use taskboard_core::role::{Actor, Role};
use taskboard_core::stats::TaskStatistics;
use taskboard_core::task::Task;
use taskboard_core::types::ActorId;
use taskboard_core::worker::Worker;

use crate::error::ApiError;
use crate::requests::{
    CommentBody, EmployeeDashboard, LoginBody, NewTask, NextTask, ProgressBody,
};

/// Header carrying the acting user's id.
pub const ACTOR_HEADER: &str = "User-Id";

/// Upper bound on a single request, connect to last body byte.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for one dashboard session.
#[derive(Clone)]
pub struct TaskboardApi {
    client: reqwest::Client,
    api_url: String,
    actor_id: Option<ActorId>,
}

impl TaskboardApi {
    /// * `api_url` - Base URL including the `/api` prefix, e.g.
    ///   `http://host:8080/api`.
    pub fn new(api_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build HTTP client, using defaults");
                reqwest::Client::new()
            });
        Self::with_client(client, api_url)
    }

    /// Reuse an existing [`reqwest::Client`] (shares its connection pool).
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            actor_id: None,
        }
    }

    /// Send the actor's id on every request. The generic operator
    /// dashboard is anonymous and sends no header.
    pub fn for_actor(mut self, actor: &Actor) -> Self {
        self.actor_id = (actor.role != Role::Operator).then_some(actor.id);
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    // ---- reads ----

    pub async fn fetch_tasks(&self, path: &str) -> Result<Vec<Task>, ApiError> {
        let records: Vec<TaskRecord> = self.get_json(path).await?;
        Ok(records.into_iter().map(Task::from).collect())
    }

    pub async fn fetch_workers(&self, path: &str) -> Result<Vec<Worker>, ApiError> {
        let records: Vec<WorkerRecord> = self.get_json(path).await?;
        Ok(records.into_iter().map(Worker::from).collect())
    }

    /// Employees, mapped onto the worker model.
    pub async fn fetch_employees(&self, path: &str) -> Result<Vec<Worker>, ApiError> {
        let records: Vec<EmployeeRecord> = self.get_json(path).await?;
        Ok(records.into_iter().map(Worker::from).collect())
    }

    pub async fn fetch_statistics(&self, path: &str) -> Result<TaskStatistics, ApiError> {
        self.get_json(path).await
    }

    /// The backend returns the newest line first; this returns them in
    /// arrival order (oldest first).
    pub async fn fetch_logs(&self, path: &str) -> Result<Vec<LogEntry>, ApiError> {
        let records: Vec<LogRecord> = self.get_json(path).await?;
        Ok(records.into_iter().rev().map(LogEntry::from).collect())
    }

    pub async fn fetch_employee_dashboard(
        &self,
        path: &str,
    ) -> Result<EmployeeDashboard, ApiError> {
        let record: EmployeeDashboardRecord = self.get_json(path).await?;
        Ok(record.into())
    }

    // ---- actions ----

    /// Create a task at `path` and return it as the backend stored it.
    pub async fn create_task(&self, path: &str, task: &NewTask) -> Result<Task, ApiError> {
        let response = self.post(path).json(task).send().await?;
        let record: TaskRecord = Self::parse_response(response).await?;
        Ok(record.into())
    }

    /// `POST /employee/tasks/get-next`.
    pub async fn get_next_task(&self) -> Result<NextTask, ApiError> {
        let response = self.post("/employee/tasks/get-next").send().await?;
        let record: NextTaskRecord = Self::parse_response(response).await?;
        Ok(match record {
            NextTaskRecord::Task(task) => NextTask::Assigned(task.into()),
            NextTaskRecord::Notice { message } => NextTask::Unavailable(message),
        })
    }

    /// `POST /employee/tasks/{id}/progress`. The backend answers with a
    /// notice, not the task.
    pub async fn update_progress(&self, task_id: &str, progress: u8) -> Result<(), ApiError> {
        let response = self
            .post(&format!("/employee/tasks/{task_id}/progress"))
            .json(&ProgressBody { progress })
            .send()
            .await?;
        Self::check_status(response).await
    }

    /// `POST /employee/tasks/{id}/complete`.
    pub async fn complete_task(&self, task_id: &str, message: &str) -> Result<Task, ApiError> {
        self.finish(task_id, "complete", message).await
    }

    /// `POST /employee/tasks/{id}/fail`.
    pub async fn fail_task(&self, task_id: &str, message: &str) -> Result<Task, ApiError> {
        self.finish(task_id, "fail", message).await
    }

    /// `POST /auth/login`. Returns the signed-in actor.
    pub async fn login(&self, username: &str, password: &str) -> Result<Actor, ApiError> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&LoginBody { username, password })
            .send()
            .await?;
        let record: UserRecord = Self::parse_response(response).await?;
        Actor::try_from(record).map_err(|e| ApiError::Decode(e.to_string()))
    }

    // ---- private helpers ----

    async fn finish(&self, task_id: &str, outcome: &str, message: &str) -> Result<Task, ApiError> {
        let response = self
            .post(&format!("/employee/tasks/{task_id}/{outcome}"))
            .json(&CommentBody { message })
            .send()
            .await?;
        let record: TaskRecord = Self::parse_response(response).await?;
        Ok(record.into())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.identified(self.client.get(self.url(path)))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.identified(self.client.post(self.url(path)))
    }

    fn identified(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.actor_id {
            Some(id) => request.header(ACTOR_HEADER, id.to_string()),
            None => request,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        tracing::trace!(path, "GET");
        let response = self.get(path).send().await?;
        Self::parse_response(response).await
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`ApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}
