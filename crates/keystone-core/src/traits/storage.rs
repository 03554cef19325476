//! Storage provider trait for pluggable session persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::result::AppResult;
use crate::types::session::{Session, SessionQuery};

/// Trait for session storage backends.
///
/// Implementations are ordinary plugins; the host obtains one through the
/// plugin registry once loading has finished.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Read a session by ID.
    async fn read_session(&self, id: Uuid) -> AppResult<Option<Session>>;

    /// Insert or replace a session.
    async fn write_session(&self, session: &Session) -> AppResult<()>;

    /// Delete a session. Returns whether it existed.
    async fn delete_session(&self, id: Uuid) -> AppResult<bool>;

    /// Return sessions matching the query, newest first.
    async fn query_sessions(&self, query: &SessionQuery) -> AppResult<Vec<Session>>;

    /// Count sessions matching the query (paging is ignored).
    async fn count_sessions(&self, query: &SessionQuery) -> AppResult<usize>;

    /// Check whether the backend is usable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Flush and release resources.
    async fn shutdown(&self) -> AppResult<()>;
}
