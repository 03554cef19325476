//! Memory storage plugin implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use keystone_core::traits::StorageProvider;
use keystone_core::types::{Session, SessionQuery};
use keystone_plugin_sdk::prelude::*;

use crate::hooks::{CompletionTracker, StampStoredBy};
use crate::store::SessionStore;

const DEFAULT_SNAPSHOT_FILE: &str = "sessions.json";

/// Session storage backed by a process-local map.
///
/// Configuration keys (all optional):
/// - `snapshotFile`: file name under the data directory (`sessions.json`)
/// - `persist`: restore on initialize and save on shutdown (`true`)
/// - `hookPriority`: priority of the `after-complete-session` stamp (`0`)
#[derive(Debug)]
pub struct MemoryStoragePlugin {
    store: Arc<SessionStore>,
    completed: Arc<AtomicU64>,
    context: ContextCell,
}

impl MemoryStoragePlugin {
    pub fn new() -> Self {
        Self {
            store: Arc::new(SessionStore::new()),
            completed: Arc::new(AtomicU64::new(0)),
            context: ContextCell::new(),
        }
    }

    /// Number of `session:completed` events observed.
    pub fn completed_count(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    fn persist_enabled(&self) -> bool {
        self.context.config_or("persist", true)
    }

    fn snapshot_path(&self, context: &PluginContext) -> PathBuf {
        let file: String = self
            .context
            .config_or("snapshotFile", DEFAULT_SNAPSHOT_FILE.to_string());
        context.data_dir().join(file)
    }

    /// Writes the snapshot if persistence is on and the plugin was initialized.
    async fn flush(&self) -> AppResult<()> {
        let Ok(context) = self.context.get() else {
            return Ok(());
        };
        if !self.persist_enabled() {
            return Ok(());
        }

        let path = self.snapshot_path(context);
        let saved = self.store.save_snapshot(&path).await?;
        context
            .logger()
            .info(format!("Saved {saved} sessions to {}", path.display()));
        Ok(())
    }
}

impl Default for MemoryStoragePlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for MemoryStoragePlugin {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::new(crate::EXPORT_NAME, env!("CARGO_PKG_VERSION"))
            .with_description("In-memory session storage with JSON snapshots")
    }

    async fn initialize(&self, context: PluginContext) -> AppResult<()> {
        self.context.set(context.clone())?;

        if self.persist_enabled() {
            let path = self.snapshot_path(&context);
            let restored = self.store.load_snapshot(&path).await?;
            if restored > 0 {
                context
                    .logger()
                    .info(format!("Restored {restored} sessions from {}", path.display()));
            }
        }

        let priority = self.context.config_or("hookPriority", 0i32);
        context
            .hooks()
            .register(
                StandardHook::AfterCompleteSession.as_str(),
                Arc::new(StampStoredBy::new(context.name())),
                priority,
            )
            .await?;

        context
            .events()
            .on(
                SESSION_COMPLETED,
                Arc::new(CompletionTracker::new(
                    Arc::clone(&self.store),
                    Arc::clone(&self.completed),
                )),
            )
            .await?;

        context.logger().debug("Memory storage initialized");
        Ok(())
    }

    async fn shutdown(&self) -> AppResult<()> {
        self.flush().await
    }

    async fn health_check(&self) -> bool {
        self.context.is_set()
    }

    fn as_storage_provider(&self) -> Option<&dyn StorageProvider> {
        Some(self)
    }
}

#[async_trait]
impl StorageProvider for MemoryStoragePlugin {
    async fn read_session(&self, id: Uuid) -> AppResult<Option<Session>> {
        Ok(self.store.get(id).await)
    }

    async fn write_session(&self, session: &Session) -> AppResult<()> {
        self.store.put(session.clone()).await;
        Ok(())
    }

    async fn delete_session(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.store.remove(id).await)
    }

    async fn query_sessions(&self, query: &SessionQuery) -> AppResult<Vec<Session>> {
        Ok(self.store.query(query).await)
    }

    async fn count_sessions(&self, query: &SessionQuery) -> AppResult<usize> {
        Ok(self.store.count(query).await)
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }

    async fn shutdown(&self) -> AppResult<()> {
        self.flush().await
    }
}
