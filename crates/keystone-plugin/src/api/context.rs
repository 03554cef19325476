//! The capability object handed to `Plugin::initialize`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::logger::PluginLogger;
use super::permissions::PermissionGuard;
use super::scoped::{PluginEvents, PluginHooks};
use crate::events::EventBus;
use crate::hooks::HookPipeline;
use crate::manifest::PluginPermissions;
use crate::registry::PluginRegistry;
use crate::traits::Plugin;

/// Context given to a plugin when it is initialized.
///
/// Cheap to clone; plugins usually keep one for their whole lifetime.
#[derive(Clone)]
pub struct PluginContext {
    name: String,
    config: Map<String, Value>,
    logger: PluginLogger,
    hooks: PluginHooks,
    events: PluginEvents,
    data_dir: PathBuf,
    registry: Weak<PluginRegistry>,
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("name", &self.name)
            .field("data_dir", &self.data_dir)
            .finish_non_exhaustive()
    }
}

/// Everything the loader supplies to build a context.
#[derive(Debug, Clone)]
pub struct ContextParts {
    /// Owning plugin.
    pub name: String,
    /// Merged configuration.
    pub config: Map<String, Value>,
    /// Pre-created private directory.
    pub data_dir: PathBuf,
    /// Shared hook pipeline.
    pub hooks: HookPipeline,
    /// Shared event bus.
    pub events: EventBus,
    /// Declared permissions.
    pub permissions: PluginPermissions,
    /// Reject undeclared hook and event names instead of warning.
    pub enforce_permissions: bool,
}

impl PluginContext {
    /// Builds a context bound to `registry` for cross-plugin lookups.
    pub fn new(parts: ContextParts, registry: &Arc<PluginRegistry>) -> Self {
        let mut context = Self::detached(parts);
        context.registry = Arc::downgrade(registry);
        context
    }

    /// Builds a context with private hooks and events and no registry.
    ///
    /// Intended for exercising a plugin in isolation.
    pub fn standalone(name: &str, data_dir: impl Into<PathBuf>) -> Self {
        Self::detached(ContextParts {
            name: name.to_string(),
            config: Map::new(),
            data_dir: data_dir.into(),
            hooks: HookPipeline::new(),
            events: EventBus::new(),
            permissions: PluginPermissions::default(),
            enforce_permissions: false,
        })
    }

    fn detached(parts: ContextParts) -> Self {
        let guard = PermissionGuard::new(&parts.name, &parts.permissions, parts.enforce_permissions);
        Self {
            logger: PluginLogger::new(&parts.name),
            hooks: PluginHooks::new(&parts.name, parts.hooks, guard.clone()),
            events: PluginEvents::new(&parts.name, parts.events, guard),
            name: parts.name,
            config: parts.config,
            data_dir: parts.data_dir,
            registry: Weak::new(),
        }
    }

    /// Builder: replaces the configuration map.
    pub fn with_config(mut self, config: Map<String, Value>) -> Self {
        self.config = config;
        self
    }

    /// Owning plugin name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Manifest defaults merged with host overrides.
    pub fn config(&self) -> &Map<String, Value> {
        &self.config
    }

    /// Deserializes one configuration value. `None` if absent or mistyped.
    pub fn config_value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn logger(&self) -> &PluginLogger {
        &self.logger
    }

    pub fn hooks(&self) -> &PluginHooks {
        &self.hooks
    }

    pub fn events(&self) -> &PluginEvents {
        &self.events
    }

    /// Exclusive directory for this plugin's persisted state.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Looks up another plugin. `None` unless it exists and is `ACTIVE`.
    pub async fn get_plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        let registry = self.registry.upgrade()?;
        registry.get_active_instance(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_standalone_context() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Map::new();
        config.insert("limit".into(), json!(5));
        config.insert("name".into(), json!("x"));
        let ctx = PluginContext::standalone("solo", tmp.path()).with_config(config);

        assert_eq!(ctx.name(), "solo");
        assert_eq!(ctx.config_value::<u32>("limit"), Some(5));
        assert_eq!(ctx.config_value::<u32>("name"), None);
        assert_eq!(ctx.config_value::<u32>("absent"), None);
        assert_eq!(ctx.data_dir(), tmp.path());
        assert!(ctx.get_plugin("other").await.is_none());
    }

    #[tokio::test]
    async fn test_facades_tag_owner() {
        let pipeline = HookPipeline::new();
        let bus = EventBus::new();
        let ctx = PluginContext::detached(ContextParts {
            name: "owner".into(),
            config: Map::new(),
            data_dir: PathBuf::from("/tmp/owner"),
            hooks: pipeline.clone(),
            events: bus.clone(),
            permissions: PluginPermissions::default(),
            enforce_permissions: false,
        });

        ctx.hooks()
            .register_fn("h", 0, |v| async move { Ok(v) })
            .await
            .unwrap();
        ctx.events()
            .on_fn("e", |_| async move { Ok(()) })
            .await
            .unwrap();

        assert_eq!(pipeline.handler_count("h").await, 1);
        assert_eq!(pipeline.unregister_plugin("owner").await, 1);
        assert_eq!(bus.off_owner("owner").await, 1);
    }

    #[tokio::test]
    async fn test_enforced_permissions_reject_undeclared() {
        let ctx = PluginContext::detached(ContextParts {
            name: "strict".into(),
            config: Map::new(),
            data_dir: PathBuf::from("/tmp/strict"),
            hooks: HookPipeline::new(),
            events: EventBus::new(),
            permissions: PluginPermissions {
                events: vec!["session:completed".into()],
                ..PluginPermissions::default()
            },
            enforce_permissions: true,
        });

        assert!(ctx.events().emit("session:completed", json!({})).await.is_ok());
        assert!(ctx.events().emit("session:started", json!({})).await.is_err());
    }
}
