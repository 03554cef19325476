//! Session operations routed through the active provider plugins.
//!
//! Every operation fires the matching standard hooks and session events so
//! plugins can reshape or observe it.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;

use keystone_core::types::{Encounter, EncounterRequest, Session, SessionStatus};
use keystone_core::{AppError, AppResult};
use keystone_plugin::events::definitions::{SESSION_COMPLETED, SESSION_STARTED};
use keystone_plugin::{Plugin, PluginLoader, StandardHook};

/// Host-side session service.
pub struct SessionService {
    loader: Arc<PluginLoader>,
}

impl SessionService {
    pub fn new(loader: Arc<PluginLoader>) -> Self {
        Self { loader }
    }

    async fn storage(&self) -> AppResult<Arc<dyn Plugin>> {
        self.loader
            .storage_provider()
            .await
            .ok_or_else(|| AppError::service_unavailable("No active storage provider"))
    }

    async fn llm(&self) -> AppResult<Arc<dyn Plugin>> {
        self.loader
            .llm_provider()
            .await
            .ok_or_else(|| AppError::service_unavailable("No active LLM provider"))
    }

    /// Whether sessions can be created. Logs the provider in use.
    pub async fn storage_ready(&self) -> bool {
        match self.loader.storage_provider().await {
            Some(plugin) => {
                tracing::info!(plugin = %plugin.metadata().name, "Storage provider ready");
                true
            }
            None => {
                tracing::warn!("No storage provider active; sessions are unavailable");
                false
            }
        }
    }

    /// Whether encounters can be generated. Logs the provider in use.
    pub async fn llm_ready(&self) -> bool {
        match self.loader.llm_provider().await {
            Some(plugin) => {
                tracing::info!(plugin = %plugin.metadata().name, "LLM provider ready");
                true
            }
            None => {
                tracing::warn!("No LLM provider active; encounters are unavailable");
                false
            }
        }
    }

    async fn trigger(&self, hook: StandardHook, value: Value) -> Value {
        self.loader.hooks().trigger(hook.as_str(), value).await
    }

    /// Creates and stores a session. `before-create-session` may rewrite
    /// `data`; `after-create-session` only observes.
    pub async fn create_session(&self, user_id: &str, data: Value) -> AppResult<Session> {
        let plugin = self.storage().await?;
        let storage = plugin
            .as_storage_provider()
            .ok_or_else(|| AppError::internal("Storage plugin lost its provider interface"))?;

        let data = self.trigger(StandardHook::BeforeCreateSession, data).await;
        let session = Session::new(user_id, data);
        storage.write_session(&session).await?;

        self.trigger(StandardHook::AfterCreateSession, serde_json::to_value(&session)?)
            .await;
        self.loader
            .events()
            .emit(
                SESSION_STARTED,
                json!({ "id": session.id, "userId": session.user_id }),
            )
            .await;

        tracing::info!(session = %session.id, user = %session.user_id, "Session created");
        Ok(session)
    }

    /// Marks a session completed with `result` stored under `data.result`.
    ///
    /// The `session:completed` payload is the output of
    /// `after-complete-session`.
    pub async fn complete_session(&self, id: Uuid, result: Value) -> AppResult<Session> {
        let plugin = self.storage().await?;
        let storage = plugin
            .as_storage_provider()
            .ok_or_else(|| AppError::internal("Storage plugin lost its provider interface"))?;

        let mut session = storage
            .read_session(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Session {id} not found")))?;
        if session.status != SessionStatus::Active {
            return Err(AppError::conflict(format!("Session {id} is not active")));
        }

        let result = self.trigger(StandardHook::BeforeCompleteSession, result).await;
        if !session.data.is_object() {
            session.data = json!({});
        }
        session.data["result"] = result;
        session.status = SessionStatus::Completed;
        session.updated_at = Utc::now();
        storage.write_session(&session).await?;

        let payload = self
            .trigger(StandardHook::AfterCompleteSession, serde_json::to_value(&session)?)
            .await;
        self.loader.events().emit(SESSION_COMPLETED, payload).await;

        tracing::info!(session = %session.id, "Session completed");
        Ok(session)
    }

    /// Asks the LLM provider for an encounter in `session`.
    pub async fn generate_encounter(&self, session: &Session, prompt: &str) -> AppResult<Encounter> {
        let plugin = self.llm().await?;
        let llm = plugin
            .as_llm_provider()
            .ok_or_else(|| AppError::internal("LLM plugin lost its provider interface"))?;

        let request = EncounterRequest {
            session_id: Some(session.id),
            prompt: prompt.to_string(),
            difficulty: session
                .data
                .get("difficulty")
                .and_then(Value::as_str)
                .map(str::to_string),
            parameters: Value::Null,
        };
        llm.generate_encounter(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_core::config::PluginConfig;
    use keystone_core::error::ErrorKind;
    use keystone_plugin::LoadOptions;

    async fn service(tmp: &std::path::Path, plugins: &[&str]) -> SessionService {
        let root = tmp.join("plugins");
        for name in plugins {
            let dir = root.join(name);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(
                dir.join("plugin.json"),
                json!({
                    "name": name,
                    "version": "0.1.0",
                    "main": format!("builtin:{name}"),
                })
                .to_string(),
            )
            .unwrap();
        }
        let config = PluginConfig {
            directory: root.to_string_lossy().into_owned(),
            data_directory: tmp.join("data").to_string_lossy().into_owned(),
            ..PluginConfig::default()
        };
        let loader = Arc::new(PluginLoader::with_builtins(config, crate::builtin_modules()));
        loader
            .load_all(LoadOptions { skip_errors: false })
            .await
            .unwrap();
        SessionService::new(loader)
    }

    #[tokio::test]
    async fn test_session_round_trip_through_plugins() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service(tmp.path(), &["memory-storage", "template-llm"]).await;

        let session = service
            .create_session("alice", json!({ "scenario": "approach" }))
            .await
            .unwrap();
        // Filled by template-llm's before-create-session hook.
        assert_eq!(session.data["difficulty"], "normal");

        let encounter = service
            .generate_encounter(&session, "crosswind")
            .await
            .unwrap();
        assert_eq!(encounter.provider, "template-llm");
        assert!(encounter.content.contains("crosswind"));

        let done = service
            .complete_session(session.id, json!({ "score": 87 }))
            .await
            .unwrap();
        assert_eq!(done.status, SessionStatus::Completed);
        assert_eq!(done.data["result"]["score"], 87);

        let again = service.complete_session(session.id, json!({})).await;
        assert_eq!(again.unwrap_err().kind, ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_missing_provider_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service(tmp.path(), &["template-llm"]).await;

        assert!(!service.storage_ready().await);
        assert!(service.llm_ready().await);

        let err = service.create_session("bob", json!({})).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ServiceUnavailable);

        let err = service
            .complete_session(Uuid::new_v4(), json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ServiceUnavailable);
    }
}
