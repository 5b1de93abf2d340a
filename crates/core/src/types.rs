/// Backend user ids are PostgreSQL BIGSERIAL.
pub type ActorId = i64;

/// Tasks are addressed by the backend-issued string identifier.
pub type TaskId = String;

/// Worker and employee identifier, e.g. `worker-3` or `employee-12`.
pub type WorkerId = String;

/// Backend-assigned id of a system log line.
pub type LogId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Worker id under which the backend tracks an employee's assignments.
pub fn employee_worker_id(actor_id: ActorId) -> WorkerId {
    format!("employee-{actor_id}")
}
