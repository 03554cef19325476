//! Session map with JSON snapshot persistence.

use std::collections::HashMap;
use std::path::Path;

use tokio::sync::RwLock;
use uuid::Uuid;

use keystone_core::types::{Session, SessionQuery};
use keystone_core::{AppError, AppResult};

/// Thread-safe in-memory session store.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: Uuid) -> Option<Session> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Inserts or replaces a session. Returns whether it replaced one.
    pub async fn put(&self, session: Session) -> bool {
        self.sessions
            .write()
            .await
            .insert(session.id, session)
            .is_some()
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    /// Matching sessions, newest first, with the query's paging applied.
    pub async fn query(&self, query: &SessionQuery) -> Vec<Session> {
        let sessions = self.sessions.read().await;
        let mut matched: Vec<Session> = sessions
            .values()
            .filter(|s| query.matches(s))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let limit = query.limit.unwrap_or(usize::MAX);
        matched.into_iter().skip(query.offset).take(limit).collect()
    }

    pub async fn count(&self, query: &SessionQuery) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| query.matches(s))
            .count()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Replaces the contents with the snapshot at `path`.
    ///
    /// A missing file leaves the store empty. Returns the number of sessions
    /// loaded.
    pub async fn load_snapshot(&self, path: &Path) -> AppResult<usize> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(AppError::storage(format!(
                    "Failed to read snapshot '{}': {e}",
                    path.display()
                )));
            }
        };

        let loaded: Vec<Session> = serde_json::from_str(&raw).map_err(|e| {
            AppError::storage(format!("Invalid snapshot '{}': {e}", path.display()))
        })?;

        let mut sessions = self.sessions.write().await;
        sessions.clear();
        sessions.extend(loaded.into_iter().map(|s| (s.id, s)));
        Ok(sessions.len())
    }

    /// Writes every session to `path`, oldest first. Returns the count.
    pub async fn save_snapshot(&self, path: &Path) -> AppResult<usize> {
        let mut all: Vec<Session> = self.sessions.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let raw = serde_json::to_string_pretty(&all)
            .map_err(|e| AppError::storage(format!("Failed to encode snapshot: {e}")))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::storage(format!("Failed to create data directory: {e}")))?;
        }
        tokio::fs::write(path, raw).await.map_err(|e| {
            AppError::storage(format!("Failed to write snapshot '{}': {e}", path.display()))
        })?;
        Ok(all.len())
    }
}
