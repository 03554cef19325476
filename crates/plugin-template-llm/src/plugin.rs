//! Template LLM plugin implementation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde_json::{Value, json};
use tokio::sync::RwLock;
use uuid::Uuid;

use keystone_core::traits::LlmProvider;
use keystone_core::types::{Encounter, EncounterRequest};
use keystone_plugin_sdk::prelude::*;

use crate::template::{EncounterTemplate, default_templates};

const DEFAULT_DIFFICULTY: &str = "normal";
const DEFAULT_STORAGE_PLUGIN: &str = "memory-storage";

/// Encounter generator that cycles through text templates.
///
/// Configuration keys (all optional):
/// - `templates`: array of `{ "title", "body" }`; built-in set when absent
/// - `defaultDifficulty`: filled into new sessions and requests (`normal`)
/// - `storagePlugin`: optional storage dependency to link with (`memory-storage`)
/// - `hookPriority`: priority of the `before-create-session` default (`0`)
#[derive(Debug)]
pub struct TemplateLlmPlugin {
    templates: RwLock<Vec<EncounterTemplate>>,
    next: AtomicUsize,
    storage_linked: AtomicBool,
    context: ContextCell,
}

impl TemplateLlmPlugin {
    pub fn new() -> Self {
        Self {
            templates: RwLock::new(Vec::new()),
            next: AtomicUsize::new(0),
            storage_linked: AtomicBool::new(false),
            context: ContextCell::new(),
        }
    }

    /// Whether a storage plugin was active when this plugin initialized.
    pub fn storage_linked(&self) -> bool {
        self.storage_linked.load(Ordering::Relaxed)
    }

    pub async fn template_count(&self) -> usize {
        self.templates.read().await.len()
    }

    fn default_difficulty(&self) -> String {
        self.context
            .config_or("defaultDifficulty", DEFAULT_DIFFICULTY.to_string())
    }
}

impl Default for TemplateLlmPlugin {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_templates(config: Option<&Value>) -> AppResult<Vec<EncounterTemplate>> {
    match config {
        None | Some(Value::Null) => Ok(default_templates()),
        Some(raw) => serde_json::from_value(raw.clone())
            .map_err(|e| AppError::validation(format!("Invalid 'templates' configuration: {e}"))),
    }
}

#[async_trait]
impl Plugin for TemplateLlmPlugin {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::new(crate::EXPORT_NAME, env!("CARGO_PKG_VERSION"))
            .with_description("Template-based encounter generator")
    }

    async fn initialize(&self, context: PluginContext) -> AppResult<()> {
        let templates = parse_templates(context.config().get("templates"))?;
        self.context.set(context.clone())?;

        if templates.is_empty() {
            context.logger().warn("No templates configured; generation will fail");
        }
        *self.templates.write().await = templates;

        let difficulty = self.default_difficulty();
        let priority = self.context.config_or("hookPriority", 0i32);
        context
            .hooks()
            .register_fn(
                StandardHook::BeforeCreateSession.as_str(),
                priority,
                move |mut value: Value| {
                    let difficulty = difficulty.clone();
                    async move {
                        if let Some(object) = value.as_object_mut() {
                            object
                                .entry("difficulty")
                                .or_insert(Value::String(difficulty));
                        }
                        Ok(value)
                    }
                },
            )
            .await?;

        let storage_name = self
            .context
            .config_or("storagePlugin", DEFAULT_STORAGE_PLUGIN.to_string());
        match context.get_plugin(&storage_name).await {
            Some(storage) if storage.provides(ProviderKind::Storage) => {
                self.storage_linked.store(true, Ordering::Relaxed);
                context
                    .logger()
                    .info(format!("Linked with storage plugin '{storage_name}'"));
            }
            _ => context
                .logger()
                .debug(format!("Storage plugin '{storage_name}' not available")),
        }

        Ok(())
    }

    async fn health_check(&self) -> bool {
        self.context.is_set() && self.template_count().await > 0
    }

    fn as_llm_provider(&self) -> Option<&dyn LlmProvider> {
        Some(self)
    }
}

#[async_trait]
impl LlmProvider for TemplateLlmPlugin {
    async fn generate_encounter(&self, request: &EncounterRequest) -> AppResult<Encounter> {
        let templates = self.templates.read().await;
        if templates.is_empty() {
            return Err(AppError::configuration("No encounter templates configured"));
        }

        let index = self.next.fetch_add(1, Ordering::Relaxed) % templates.len();
        let difficulty = request
            .difficulty
            .clone()
            .unwrap_or_else(|| self.default_difficulty());
        let (title, content) = templates[index].render(&request.prompt, &difficulty);

        Ok(Encounter {
            id: Uuid::new_v4(),
            title,
            content,
            provider: crate::EXPORT_NAME.to_string(),
            metadata: json!({
                "template": index,
                "difficulty": difficulty,
                "sessionId": request.session_id,
                "storageLinked": self.storage_linked(),
            }),
        })
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(self.template_count().await > 0)
    }

    async fn shutdown(&self) -> AppResult<()> {
        Ok(())
    }
}
