//! Cached sign-in identity.
//!
//! The identity is stored as JSON in a single file with no expiry. Logging
//! out means deleting the file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use taskboard_api::{ApiError, TaskboardApi};
use taskboard_core::role::{Actor, Role};

use crate::config::Credentials;

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("session file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("session file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The cached identity, or `None` when nobody is signed in.
    pub async fn load(&self) -> Result<Option<Actor>, SessionStoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| SessionStoreError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    pub async fn save(&self, actor: &Actor) -> Result<(), SessionStoreError> {
        let json = serde_json::to_vec_pretty(actor).map_err(|source| SessionStoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| self.io_error(e))
    }

    /// Forget the cached identity. Clearing an empty store is not an error.
    pub async fn clear(&self) -> Result<(), SessionStoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn io_error(&self, source: std::io::Error) -> SessionStoreError {
        SessionStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignInError {
    #[error(transparent)]
    Store(#[from] SessionStoreError),

    #[error("login failed: {0}")]
    Login(#[from] ApiError),

    #[error("no cached {role} session; set TASKBOARD_USERNAME and TASKBOARD_PASSWORD")]
    NoIdentity { role: Role },

    #[error("signed in as {actual}, but the dashboard is configured for {expected}")]
    RoleMismatch { expected: Role, actual: Role },
}

/// Work out who the dashboard acts for.
///
/// The operator dashboard is anonymous. Other roles reuse a cached identity
/// for the same role, or sign in with `credentials` and cache the result.
pub async fn sign_in(
    role: Role,
    store: &SessionStore,
    api: &TaskboardApi,
    credentials: Option<&Credentials>,
) -> Result<Actor, SignInError> {
    if role == Role::Operator {
        return Ok(Actor::operator());
    }

    match store.load().await {
        Ok(Some(actor)) if actor.role == role => {
            tracing::info!(username = %actor.username, %role, "Using cached session");
            return Ok(actor);
        }
        Ok(Some(actor)) => {
            tracing::warn!(cached = %actor.role, %role, "Cached session is for another role, ignoring");
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "Could not read cached session"),
    }

    let Some(credentials) = credentials else {
        return Err(SignInError::NoIdentity { role });
    };

    let actor = api.login(&credentials.username, &credentials.password).await?;
    if actor.role != role {
        return Err(SignInError::RoleMismatch {
            expected: role,
            actual: actor.role,
        });
    }
    tracing::info!(username = %actor.username, actor_id = actor.id, "Signed in");

    if let Err(e) = store.save(&actor).await {
        tracing::warn!(error = %e, "Could not cache session");
    }
    Ok(actor)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn dana() -> Actor {
        Actor {
            id: 7,
            username: "dana".into(),
            full_name: "Dana Park".into(),
            role: Role::Employee,
        }
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        assert!(store.load().await.unwrap().is_none());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn save_load_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));

        store.save(&dana()).await.unwrap();
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"fullName\": \"Dana Park\""));
        assert_eq!(store.load().await.unwrap(), Some(dana()));

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_matches!(
            SessionStore::new(path).load().await,
            Err(SessionStoreError::Corrupt { .. })
        );
    }

    #[tokio::test]
    async fn operator_needs_no_identity() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        let api = TaskboardApi::new("http://127.0.0.1:9/api".into());
        let actor = sign_in(Role::Operator, &store, &api, None).await.unwrap();
        assert_eq!(actor, Actor::operator());
    }

    #[tokio::test]
    async fn cached_session_skips_login() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        store.save(&dana()).await.unwrap();

        // Unreachable: any login attempt would fail.
        let api = TaskboardApi::new("http://127.0.0.1:9/api".into());
        let actor = sign_in(Role::Employee, &store, &api, None).await.unwrap();
        assert_eq!(actor, dana());
    }

    #[tokio::test]
    async fn no_session_and_no_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        store.save(&dana()).await.unwrap();

        let api = TaskboardApi::new("http://127.0.0.1:9/api".into());
        assert_matches!(
            sign_in(Role::Admin, &store, &api, None).await,
            Err(SignInError::NoIdentity { role: Role::Admin })
        );
    }
}
