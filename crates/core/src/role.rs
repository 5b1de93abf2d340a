//! Dashboard roles expressed as configuration data.
//!
//! Every role shares the same reconciliation and projection machinery; a
//! [`RoleProfile`] only decides which push topics are declared at connect
//! time and which REST endpoints the poll fallback reads.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{employee_worker_id, ActorId, WorkerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Generic worker-node dashboard (no login required by the backend).
    Operator,
    Admin,
    Employee,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Operator => "operator",
            Role::Admin => "admin",
            Role::Employee => "employee",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "operator" => Ok(Role::Operator),
            "admin" => Ok(Role::Admin),
            "employee" => Ok(Role::Employee),
            other => Err(CoreError::InvalidValue {
                field: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// The signed-in user a dashboard session acts for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: ActorId,
    pub username: String,
    pub full_name: String,
    pub role: Role,
}

impl Actor {
    /// Anonymous operator identity used by the generic dashboard.
    pub fn operator() -> Self {
        Self {
            id: 0,
            username: "operator".into(),
            full_name: "Operator".into(),
            role: Role::Operator,
        }
    }

    /// Worker id under which this actor's assignments appear.
    pub fn worker_id(&self) -> WorkerId {
        employee_worker_id(self.id)
    }
}

/// Shape of the subscription frame sent right after connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStyle {
    /// `{"type": "SUBSCRIBE", "topics": [...]}`
    TopicList,
    /// `{"action": "subscribe", "userId": N, "topics": [...]}`
    UserScoped,
}

/// REST paths (relative to the API base URL) read or written by a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub tasks: Option<&'static str>,
    pub workers: Option<&'static str>,
    pub employees: Option<&'static str>,
    pub statistics: Option<&'static str>,
    pub logs: Option<&'static str>,
    pub employee_dashboard: Option<&'static str>,
    pub create_task: Option<&'static str>,
}

impl Endpoints {
    const NONE: Endpoints = Endpoints {
        tasks: None,
        workers: None,
        employees: None,
        statistics: None,
        logs: None,
        employee_dashboard: None,
        create_task: None,
    };
}

/// Everything that differs between dashboards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleProfile {
    pub role: Role,
    /// Path appended to the push channel base URL.
    pub channel_path: &'static str,
    pub topics: Vec<String>,
    pub subscription: SubscriptionStyle,
    pub endpoints: Endpoints,
    pub poll_interval: Duration,
}

/// Shortest poll interval a profile accepts.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

const OPERATOR_TOPICS: [&str; 9] = [
    "/topic/task.created",
    "/topic/task.started",
    "/topic/task.progress",
    "/topic/task.completed",
    "/topic/task.failed",
    "/topic/worker.registered",
    "/topic/worker.updated",
    "/topic/worker.failed",
    "/topic/logs",
];

impl RoleProfile {
    pub fn for_actor(actor: &Actor) -> Self {
        match actor.role {
            Role::Operator => Self {
                role: Role::Operator,
                channel_path: "/websocket",
                topics: OPERATOR_TOPICS.iter().map(|t| t.to_string()).collect(),
                subscription: SubscriptionStyle::TopicList,
                endpoints: Endpoints {
                    tasks: Some("/tasks/recent"),
                    workers: Some("/workers"),
                    statistics: Some("/tasks/statistics"),
                    logs: Some("/logs"),
                    create_task: Some("/tasks"),
                    ..Endpoints::NONE
                },
                poll_interval: Duration::from_secs(2),
            },
            Role::Admin => Self {
                role: Role::Admin,
                channel_path: "",
                topics: vec!["/topic/admin/tasks".to_string()],
                subscription: SubscriptionStyle::UserScoped,
                endpoints: Endpoints {
                    tasks: Some("/admin/tasks"),
                    employees: Some("/admin/employees"),
                    statistics: Some("/admin/tasks/statistics"),
                    create_task: Some("/admin/tasks"),
                    ..Endpoints::NONE
                },
                poll_interval: Duration::from_secs(3),
            },
            Role::Employee => Self {
                role: Role::Employee,
                channel_path: "",
                topics: vec![format!("/user/{}/queue/tasks", actor.id)],
                subscription: SubscriptionStyle::UserScoped,
                endpoints: Endpoints {
                    employee_dashboard: Some("/employee/tasks/dashboard"),
                    ..Endpoints::NONE
                },
                poll_interval: Duration::from_secs(10),
            },
        }
    }

    /// Intervals below [`MIN_POLL_INTERVAL`] are raised to it.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// The subscription declaration sent once per connection.
    pub fn subscription_frame(&self, actor: &Actor) -> serde_json::Value {
        match self.subscription {
            SubscriptionStyle::TopicList => serde_json::json!({
                "type": "SUBSCRIBE",
                "topics": self.topics,
            }),
            SubscriptionStyle::UserScoped => serde_json::json!({
                "action": "subscribe",
                "userId": actor.id,
                "topics": self.topics,
            }),
        }
    }
}
