//! Per-page capture sessions
//!
//! Each page load creates its own session and addresses it by id, so camera
//! directives, images and results never leak between tabs. Sessions are
//! removed on teardown; ones whose page vanished without a teardown are
//! evicted after [`SESSION_IDLE_TIMEOUT_MINUTES`] of inactivity.

use chrono::{DateTime, Duration, Utc};
use pedal_common::session::{CaptureSession, SessionSnapshot};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

pub const SESSION_IDLE_TIMEOUT_MINUTES: i64 = 30;

struct Entry {
    session: CaptureSession,
    last_seen: DateTime<Utc>,
}

/// Live sessions keyed by session id
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Entry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session, evicting idle ones first
    pub async fn create(&self) -> SessionSnapshot {
        let now = Utc::now();
        let cutoff = now - Duration::minutes(SESSION_IDLE_TIMEOUT_MINUTES);

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_seen >= cutoff);
        if sessions.len() < before {
            tracing::info!(evicted = before - sessions.len(), "Evicted idle sessions");
        }

        let session = CaptureSession::default();
        let snapshot = session.snapshot();
        sessions.insert(
            snapshot.session_id,
            Entry {
                session,
                last_seen: now,
            },
        );
        tracing::debug!(session_id = %snapshot.session_id, "Session created");
        snapshot
    }

    /// Run `f` against session `id`
    pub async fn update<F, R>(&self, id: Uuid, f: F) -> ApiResult<R>
    where
        F: FnOnce(&mut CaptureSession) -> ApiResult<R>,
    {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(&id)
            .ok_or_else(|| ApiError::NotFound(format!("Session not found: {}", id)))?;
        entry.last_seen = Utc::now();
        f(&mut entry.session)
    }

    /// Run `f` against session `id`, then drop the session
    pub async fn remove_with<F, R>(&self, id: Uuid, f: F) -> ApiResult<R>
    where
        F: FnOnce(&mut CaptureSession) -> R,
    {
        let mut sessions = self.sessions.write().await;
        let mut entry = sessions
            .remove(&id)
            .ok_or_else(|| ApiError::NotFound(format!("Session not found: {}", id)))?;
        tracing::debug!(session_id = %id, "Session removed");
        Ok(f(&mut entry.session))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    #[cfg(test)]
    async fn backdate(&self, id: Uuid, minutes: i64) {
        if let Some(entry) = self.sessions.write().await.get_mut(&id) {
            entry.last_seen = Utc::now() - Duration::minutes(minutes);
        }
    }
}
