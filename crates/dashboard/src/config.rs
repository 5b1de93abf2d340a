use std::path::PathBuf;
use std::time::Duration;

use taskboard_core::role::{Actor, Role};
use taskboard_sync::log_ring::DEFAULT_LOG_CAPACITY;
use taskboard_sync::RuntimeConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Login credentials used when no cached session exists.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Dashboard configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub api_url: String,
    pub ws_url: String,
    pub role: Role,
    /// `None` keeps the role's default interval.
    pub poll_interval: Option<Duration>,
    pub reconnect_delay: Duration,
    pub notification_duration: Duration,
    pub log_capacity: usize,
    pub session_file: PathBuf,
    pub credentials: Option<Credentials>,
}

impl DashboardConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                     |
    /// |--------------------------------|-----------------------------|
    /// | `TASKBOARD_API_URL`            | `http://localhost:8080/api` |
    /// | `TASKBOARD_WS_URL`             | `ws://localhost:8080/ws`    |
    /// | `TASKBOARD_ROLE`               | `operator`                  |
    /// | `TASKBOARD_POLL_INTERVAL_MS`   | role default                |
    /// | `TASKBOARD_RECONNECT_DELAY_MS` | `3000`                      |
    /// | `TASKBOARD_NOTIFICATION_SECS`  | `5`                         |
    /// | `TASKBOARD_LOG_CAPACITY`       | `100`                       |
    /// | `TASKBOARD_SESSION_FILE`       | `.taskboard-session.json`   |
    /// | `TASKBOARD_USERNAME`           | unset                       |
    /// | `TASKBOARD_PASSWORD`           | unset                       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`DashboardConfig::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_url = var("TASKBOARD_API_URL").unwrap_or_else(|| "http://localhost:8080/api".into());
        let ws_url = var("TASKBOARD_WS_URL").unwrap_or_else(|| "ws://localhost:8080/ws".into());

        let role = match var("TASKBOARD_ROLE") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                var: "TASKBOARD_ROLE",
                value: raw,
            })?,
            None => Role::Operator,
        };

        let poll_interval = var("TASKBOARD_POLL_INTERVAL_MS")
            .map(|raw| parse_positive("TASKBOARD_POLL_INTERVAL_MS", raw))
            .transpose()?
            .map(Duration::from_millis);

        let reconnect_delay = Duration::from_millis(match var("TASKBOARD_RECONNECT_DELAY_MS") {
            Some(raw) => parse_positive("TASKBOARD_RECONNECT_DELAY_MS", raw)?,
            None => 3_000,
        });

        let notification_duration = Duration::from_secs(match var("TASKBOARD_NOTIFICATION_SECS") {
            Some(raw) => parse_positive("TASKBOARD_NOTIFICATION_SECS", raw)?,
            None => 5,
        });

        let log_capacity = match var("TASKBOARD_LOG_CAPACITY") {
            Some(raw) => parse_positive("TASKBOARD_LOG_CAPACITY", raw)? as usize,
            None => DEFAULT_LOG_CAPACITY,
        };

        let session_file = var("TASKBOARD_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".taskboard-session.json"));

        let credentials = match (var("TASKBOARD_USERNAME"), lookup("TASKBOARD_PASSWORD")) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            _ => None,
        };

        Ok(Self {
            api_url,
            ws_url,
            role,
            poll_interval,
            reconnect_delay,
            notification_duration,
            log_capacity,
            session_file,
            credentials,
        })
    }

    /// Runtime settings for a session acting as `actor`.
    pub fn runtime(&self, actor: Actor) -> RuntimeConfig {
        RuntimeConfig {
            poll_interval: self.poll_interval,
            reconnect_delay: self.reconnect_delay,
            notification_duration: self.notification_duration,
            log_capacity: self.log_capacity,
            ..RuntimeConfig::new(self.api_url.clone(), self.ws_url.clone(), actor)
        }
    }
}

fn parse_positive(var: &'static str, raw: String) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::Invalid { var, value: raw }),
    }
}
