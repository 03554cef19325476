//! Hook and event handlers registered by the memory storage plugin.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use keystone_core::AppResult;
use keystone_core::types::SessionStatus;
use keystone_plugin_sdk::prelude::{Event, EventHandler, HookHandler};

use crate::store::SessionStore;

/// `after-complete-session`: records which backend stored the session.
pub struct StampStoredBy {
    plugin: String,
}

impl StampStoredBy {
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
        }
    }
}

#[async_trait]
impl HookHandler for StampStoredBy {
    async fn handle(&self, mut value: Value) -> AppResult<Value> {
        if let Some(object) = value.as_object_mut() {
            object.insert("storedBy".to_string(), Value::String(self.plugin.clone()));
        } else {
            tracing::debug!(plugin = %self.plugin, "after-complete-session value is not an object");
        }
        Ok(value)
    }
}

/// `session:completed`: counts completions and marks the stored session.
pub struct CompletionTracker {
    store: Arc<SessionStore>,
    completed: Arc<AtomicU64>,
}

impl CompletionTracker {
    pub fn new(store: Arc<SessionStore>, completed: Arc<AtomicU64>) -> Self {
        Self { store, completed }
    }
}

#[async_trait]
impl EventHandler for CompletionTracker {
    async fn handle(&self, event: Event) -> AppResult<()> {
        self.completed.fetch_add(1, Ordering::Relaxed);

        let id = event
            .payload
            .get("id")
            .and_then(Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw).ok());
        let Some(id) = id else {
            return Ok(());
        };

        if let Some(mut session) = self.store.get(id).await {
            if session.status != SessionStatus::Completed {
                session.status = SessionStatus::Completed;
                session.updated_at = Utc::now();
                self.store.put(session).await;
            }
        }
        Ok(())
    }
}
