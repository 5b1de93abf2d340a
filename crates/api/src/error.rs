use serde::Deserialize;

/// Errors from the REST layer.
///
/// Poll failures are logged and retried on the next tick; failures of
/// user-initiated calls are turned into a visible message with
/// [`ApiError::user_message`].
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Taskboard API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// A 2xx response whose body does not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Error payload the backend attaches to failed requests.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ApiError { status, .. } => Some(*status),
            ApiError::Request(e) => e.status().map(|s| s.as_u16()),
            ApiError::Decode(_) => None,
        }
    }

    /// Text suitable for showing to the user: the server's error payload
    /// when it has one, else `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        let ApiError::ApiError { body, .. } = self else {
            return fallback.to_string();
        };
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.error.or(b.message))
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }
}
