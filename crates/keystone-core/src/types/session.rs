//! Session records persisted by storage providers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// The session is in progress.
    Active,
    /// The session finished normally.
    Completed,
    /// The session was abandoned before completion.
    Abandoned,
}

/// A persisted session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session ID.
    pub id: Uuid,
    /// Owner of the session.
    pub user_id: String,
    /// Current status.
    pub status: SessionStatus,
    /// Free-form session data, shaped by hooks and the host.
    #[serde(default)]
    pub data: serde_json::Value,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last written.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Creates a new active session for a user.
    pub fn new(user_id: impl Into<String>, data: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            status: SessionStatus::Active,
            data,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Filter used by `query_sessions` / `count_sessions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionQuery {
    /// Only sessions owned by this user.
    pub user_id: Option<String>,
    /// Only sessions in this status.
    pub status: Option<SessionStatus>,
    /// Only sessions created at or after this instant.
    pub created_after: Option<DateTime<Utc>>,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Number of matching results to skip.
    #[serde(default)]
    pub offset: usize,
}

impl SessionQuery {
    /// Returns whether a session satisfies the filter (ignores paging).
    pub fn matches(&self, session: &Session) -> bool {
        if let Some(user_id) = &self.user_id {
            if &session.user_id != user_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if session.status != status {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if session.created_at < after {
                return false;
            }
        }
        true
    }
}
