//! Plugin registry, the source of truth for every discovered plugin.
//!
//! Entries are only ever mutated through registry methods. Every state change
//! emits a lifecycle notification on the shared [`EventBus`] after the lock
//! has been released.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::api::context::PluginContext;
use crate::error::{PluginError, PluginResult};
use crate::events::EventBus;
use crate::events::definitions as ev;
use crate::manifest::PluginManifest;
use crate::state::PluginState;
use crate::traits::{Plugin, ProviderKind};

/// Runtime record of one plugin.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    /// Unique plugin name.
    pub name: String,
    /// Manifest version.
    pub version: String,
    /// Plugin directory.
    pub source_path: PathBuf,
    /// Manifest as registered.
    pub manifest: PluginManifest,
    /// Set once the plugin is `LOADED`.
    pub instance: Option<Arc<dyn Plugin>>,
    /// Set once the plugin is `INITIALIZING`.
    pub context: Option<PluginContext>,
    /// Current lifecycle state.
    pub state: PluginState,
    /// When the instance was constructed.
    pub loaded_at: Option<DateTime<Utc>>,
    /// Last lifecycle failure.
    pub error: Option<PluginError>,
}

impl RegistryEntry {
    fn new(name: &str, manifest: PluginManifest, path: &Path) -> Self {
        Self {
            name: name.to_string(),
            version: manifest.version.clone(),
            source_path: path.to_path_buf(),
            manifest,
            instance: None,
            context: None,
            state: PluginState::Unloaded,
            loaded_at: None,
            error: None,
        }
    }

    /// Builds a serializable summary of the entry.
    pub fn summary(&self) -> PluginSummary {
        PluginSummary {
            name: self.name.clone(),
            version: self.version.clone(),
            state: self.state,
            source_path: self.source_path.clone(),
            loaded_at: self.loaded_at,
            error: self.error.as_ref().map(ToString::to_string),
        }
    }
}

/// Serializable view of a registry entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginSummary {
    /// Plugin name.
    pub name: String,
    /// Manifest version.
    pub version: String,
    /// Current state.
    pub state: PluginState,
    /// Plugin directory.
    pub source_path: PathBuf,
    /// Load timestamp.
    pub loaded_at: Option<DateTime<Utc>>,
    /// Last error message.
    pub error: Option<String>,
}

/// Outcome of checking a plugin's required dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyCheck {
    /// Required dependencies not in the registry.
    pub missing: Vec<String>,
    /// Required dependencies registered but in `ERROR`.
    pub failed: Vec<String>,
}

impl DependencyCheck {
    /// Returns whether every required dependency is usable.
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty() && self.failed.is_empty()
    }

    /// Missing and failed names together.
    pub fn unsatisfied(&self) -> Vec<String> {
        self.missing.iter().chain(&self.failed).cloned().collect()
    }
}

#[derive(Default)]
struct Entries {
    by_name: HashMap<String, RegistryEntry>,
    /// Registration order.
    order: Vec<String>,
}

impl Entries {
    fn get_mut(&mut self, name: &str) -> PluginResult<&mut RegistryEntry> {
        self.by_name
            .get_mut(name)
            .ok_or_else(|| PluginError::NotFound(name.to_string()))
    }
}

/// Registry of all plugins known to a runtime.
pub struct PluginRegistry {
    entries: RwLock<Entries>,
    events: EventBus,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry").finish_non_exhaustive()
    }
}

impl PluginRegistry {
    /// Creates an empty registry publishing lifecycle events on `events`.
    pub fn new(events: EventBus) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            events,
        }
    }

    /// The bus lifecycle notifications go to.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Adds a plugin in `UNLOADED`.
    pub async fn register(
        &self,
        name: &str,
        manifest: PluginManifest,
        path: &Path,
    ) -> PluginResult<()> {
        {
            let mut entries = self.entries.write().await;
            if entries.by_name.contains_key(name) {
                return Err(PluginError::DuplicateName(name.to_string()));
            }
            info!(plugin = %name, version = %manifest.version, path = %path.display(), "Registering plugin");
            entries
                .by_name
                .insert(name.to_string(), RegistryEntry::new(name, manifest, path));
            entries.order.push(name.to_string());
        }

        self.notify(ev::PLUGIN_REGISTERED, name, PluginState::Unloaded, None)
            .await;
        Ok(())
    }

    /// Stores a freshly constructed instance and moves the plugin to `LOADED`.
    pub async fn set_instance(&self, name: &str, instance: Arc<dyn Plugin>) -> PluginResult<()> {
        let previous = {
            let mut entries = self.entries.write().await;
            let entry = entries.get_mut(name)?;
            let previous = entry.state;
            if !matches!(previous, PluginState::Unloaded | PluginState::Loading) {
                return Err(PluginError::invalid_state(
                    name,
                    previous,
                    "an instance can only be set while loading",
                ));
            }
            entry.instance = Some(instance);
            entry.loaded_at = Some(Utc::now());
            entry.state = PluginState::Loaded;
            previous
        };

        self.notify(ev::PLUGIN_LOADED, name, PluginState::Loaded, Some(previous))
            .await;
        Ok(())
    }

    /// Attaches the context handed to `initialize`. No state change.
    pub async fn set_context(&self, name: &str, context: PluginContext) -> PluginResult<()> {
        let mut entries = self.entries.write().await;
        entries.get_mut(name)?.context = Some(context);
        Ok(())
    }

    /// Moves a plugin to `state`, validating the transition.
    ///
    /// Setting the current state again is a no-op. Entering `LOADING` drops
    /// the previous instance, context, load time, and error.
    pub async fn set_state(&self, name: &str, state: PluginState) -> PluginResult<()> {
        let previous = {
            let mut entries = self.entries.write().await;
            let entry = entries.get_mut(name)?;
            let previous = entry.state;
            if previous == state {
                return Ok(());
            }
            if !previous.can_transition_to(state) {
                return Err(PluginError::invalid_state(
                    name,
                    previous,
                    format!("cannot move to {state}"),
                ));
            }
            if state == PluginState::Loading {
                entry.instance = None;
                entry.context = None;
                entry.loaded_at = None;
                entry.error = None;
            }
            entry.state = state;
            previous
        };

        debug!(plugin = %name, from = %previous, to = %state, "Plugin state changed");
        if let Some(event) = lifecycle_event(state) {
            self.notify(event, name, state, Some(previous)).await;
        }
        Ok(())
    }

    /// Records `error` and forces the plugin into `ERROR`.
    pub async fn set_error(&self, name: &str, error: PluginError) -> PluginResult<()> {
        let message = error.to_string();
        let previous = {
            let mut entries = self.entries.write().await;
            let entry = entries.get_mut(name)?;
            let previous = entry.state;
            entry.error = Some(error);
            entry.state = PluginState::Error;
            previous
        };

        warn!(plugin = %name, from = %previous, error = %message, "Plugin entered ERROR state");
        let payload = json!({
            "name": name,
            "state": PluginState::Error,
            "previous": previous,
            "error": message,
        });
        self.events.emit(ev::PLUGIN_ERROR, payload).await;
        Ok(())
    }

    /// Snapshot of an entry.
    pub async fn get(&self, name: &str) -> Option<RegistryEntry> {
        let entries = self.entries.read().await;
        entries.by_name.get(name).cloned()
    }

    /// The plugin's instance, if it was ever loaded. Never fails.
    pub async fn get_instance(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        let entries = self.entries.read().await;
        entries.by_name.get(name).and_then(|e| e.instance.clone())
    }

    /// The plugin's instance, only while it is `ACTIVE`.
    pub async fn get_active_instance(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        let entries = self.entries.read().await;
        entries
            .by_name
            .get(name)
            .filter(|e| e.state == PluginState::Active)
            .and_then(|e| e.instance.clone())
    }

    /// Current state of a plugin.
    pub async fn state(&self, name: &str) -> Option<PluginState> {
        let entries = self.entries.read().await;
        entries.by_name.get(name).map(|e| e.state)
    }

    /// Checks that every required dependency of `name` is registered and not
    /// in `ERROR`. Optional dependencies are ignored.
    pub async fn validate_dependencies(&self, name: &str) -> PluginResult<DependencyCheck> {
        let entries = self.entries.read().await;
        let entry = entries
            .by_name
            .get(name)
            .ok_or_else(|| PluginError::NotFound(name.to_string()))?;

        let mut check = DependencyCheck::default();
        for dep in entry.manifest.required_dependencies() {
            match entries.by_name.get(&dep.name) {
                None => check.missing.push(dep.name.clone()),
                Some(target) if target.state == PluginState::Error => {
                    check.failed.push(dep.name.clone())
                }
                Some(target) => {
                    if !dep.accepts(&target.version) {
                        warn!(
                            plugin = %name,
                            dependency = %dep.name,
                            required = %dep.version,
                            found = %target.version,
                            "Dependency version does not satisfy the declared range"
                        );
                    }
                }
            }
        }
        Ok(check)
    }

    /// Removes a plugin. Fails while it is `ACTIVE`.
    pub async fn unregister(&self, name: &str) -> PluginResult<RegistryEntry> {
        let removed = {
            let mut entries = self.entries.write().await;
            let state = entries.get_mut(name)?.state;
            if state == PluginState::Active {
                return Err(PluginError::invalid_state(
                    name,
                    state,
                    "deactivate the plugin before unregistering it",
                ));
            }
            entries.order.retain(|n| n != name);
            entries
                .by_name
                .remove(name)
                .ok_or_else(|| PluginError::NotFound(name.to_string()))?
        };

        info!(plugin = %name, "Plugin unregistered");
        self.notify(ev::PLUGIN_UNREGISTERED, name, removed.state, None)
            .await;
        Ok(removed)
    }

    /// Summaries of every entry, sorted by name.
    pub async fn list(&self) -> Vec<PluginSummary> {
        let entries = self.entries.read().await;
        let mut list: Vec<PluginSummary> =
            entries.by_name.values().map(RegistryEntry::summary).collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// Names in registration order.
    pub async fn names(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        entries.order.clone()
    }

    /// Returns whether `name` is registered.
    pub async fn contains(&self, name: &str) -> bool {
        let entries = self.entries.read().await;
        entries.by_name.contains_key(name)
    }

    /// Number of registered plugins.
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.by_name.len()
    }

    /// Returns whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// First `ACTIVE` plugin, in registration order, exposing `kind`.
    pub async fn find_provider(&self, kind: ProviderKind) -> Option<(String, Arc<dyn Plugin>)> {
        let entries = self.entries.read().await;
        entries.order.iter().find_map(|name| {
            let entry = entries.by_name.get(name)?;
            if entry.state != PluginState::Active {
                return None;
            }
            let instance = entry.instance.as_ref()?;
            instance
                .provides(kind)
                .then(|| (name.clone(), instance.clone()))
        })
    }

    async fn notify(
        &self,
        event: &str,
        name: &str,
        state: PluginState,
        previous: Option<PluginState>,
    ) {
        let payload = json!({
            "name": name,
            "state": state,
            "previous": previous.map_or(Value::Null, |p| json!(p)),
        });
        self.events.emit(event, payload).await;
    }
}

fn lifecycle_event(state: PluginState) -> Option<&'static str> {
    match state {
        PluginState::Unloaded => None,
        PluginState::Loading => Some(ev::PLUGIN_LOADING),
        PluginState::Loaded => Some(ev::PLUGIN_LOADED),
        PluginState::Initializing => Some(ev::PLUGIN_INITIALIZING),
        PluginState::Active => Some(ev::PLUGIN_ACTIVATED),
        PluginState::ShuttingDown => Some(ev::PLUGIN_DEACTIVATING),
        PluginState::ShutDown => Some(ev::PLUGIN_SHUTDOWN),
        PluginState::Error => Some(ev::PLUGIN_ERROR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::PluginDependency;
    use async_trait::async_trait;
    use keystone_core::AppResult;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct Noop;

    #[async_trait]
    impl Plugin for Noop {
        fn metadata(&self) -> crate::traits::PluginMetadata {
            crate::traits::PluginMetadata::new("noop", "1.0.0")
        }

        async fn initialize(&self, _context: PluginContext) -> AppResult<()> {
            Ok(())
        }
    }

    fn manifest(name: &str) -> PluginManifest {
        PluginManifest::new(name, "1.0.0", format!("builtin:{name}"))
    }

    async fn registry_with(names: &[&str]) -> PluginRegistry {
        let registry = PluginRegistry::new(EventBus::new());
        for name in names {
            registry
                .register(name, manifest(name), Path::new("/plugins"))
                .await
                .unwrap();
        }
        registry
    }

    async fn drive_to_active(registry: &PluginRegistry, name: &str) {
        registry.set_state(name, PluginState::Loading).await.unwrap();
        registry.set_instance(name, Arc::new(Noop)).await.unwrap();
        registry
            .set_state(name, PluginState::Initializing)
            .await
            .unwrap();
        registry.set_state(name, PluginState::Active).await.unwrap();
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates() {
        let registry = registry_with(&["a"]).await;
        let err = registry
            .register("a", manifest("a"), Path::new("/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::DuplicateName(_)));
        assert_eq!(registry.state("a").await, Some(PluginState::Unloaded));
    }

    #[tokio::test]
    async fn test_set_instance_requires_entry() {
        let registry = registry_with(&[]).await;
        let err = registry
            .set_instance("ghost", Arc::new(Noop))
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::NotFound(_)));
        assert!(registry.get_instance("ghost").await.is_none());
    }

    #[tokio::test]
    async fn test_set_instance_marks_loaded() {
        let registry = registry_with(&["a"]).await;
        registry.set_state("a", PluginState::Loading).await.unwrap();
        registry.set_instance("a", Arc::new(Noop)).await.unwrap();

        let entry = registry.get("a").await.unwrap();
        assert_eq!(entry.state, PluginState::Loaded);
        assert!(entry.instance.is_some());
        assert!(entry.loaded_at.is_some());
        assert!(registry.get_active_instance("a").await.is_none());
    }

    #[tokio::test]
    async fn test_illegal_transition_rejected() {
        let registry = registry_with(&["a"]).await;
        let err = registry
            .set_state("a", PluginState::Active)
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::InvalidState { .. }));
        // Same state is a no-op.
        registry.set_state("a", PluginState::Unloaded).await.unwrap();
    }

    #[tokio::test]
    async fn test_set_error_records_and_emits() {
        let registry = registry_with(&["a"]).await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        registry
            .events()
            .on_fn(ev::PLUGIN_ERROR, move |e| {
                let sink = sink.clone();
                async move {
                    sink.lock().unwrap().push(e.payload);
                    Ok(())
                }
            })
            .await;

        registry
            .set_error("a", PluginError::load("a", "no such file"))
            .await
            .unwrap();

        let entry = registry.get("a").await.unwrap();
        assert_eq!(entry.state, PluginState::Error);
        assert!(entry.error.is_some());
        let payloads = seen.lock().unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0]["state"], "ERROR");
        assert_eq!(payloads[0]["previous"], "UNLOADED");
    }

    #[tokio::test]
    async fn test_lifecycle_events_in_order() {
        let registry = registry_with(&[]).await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        registry
            .events()
            .on_fn(crate::events::WILDCARD, move |e| {
                let sink = sink.clone();
                async move {
                    sink.lock().unwrap().push(e.name);
                    Ok(())
                }
            })
            .await;

        registry
            .register("a", manifest("a"), Path::new("/p"))
            .await
            .unwrap();
        drive_to_active(&registry, "a").await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ev::PLUGIN_REGISTERED,
                ev::PLUGIN_LOADING,
                ev::PLUGIN_LOADED,
                ev::PLUGIN_INITIALIZING,
                ev::PLUGIN_ACTIVATED,
            ]
        );
    }

    #[tokio::test]
    async fn test_validate_dependencies() {
        let registry = PluginRegistry::new(EventBus::new());
        let app = manifest("app")
            .with_dependency(PluginDependency::required("db"))
            .with_dependency(PluginDependency::required("cache"))
            .with_dependency(PluginDependency::optional("metrics"));
        registry
            .register("app", app, Path::new("/p"))
            .await
            .unwrap();
        registry
            .register("db", manifest("db"), Path::new("/p"))
            .await
            .unwrap();

        let check = registry.validate_dependencies("app").await.unwrap();
        assert!(!check.is_valid());
        assert_eq!(check.missing, vec!["cache"]);

        registry
            .register("cache", manifest("cache"), Path::new("/p"))
            .await
            .unwrap();
        assert!(registry.validate_dependencies("app").await.unwrap().is_valid());

        registry
            .set_error("db", PluginError::load("db", "broken"))
            .await
            .unwrap();
        let check = registry.validate_dependencies("app").await.unwrap();
        assert_eq!(check.failed, vec!["db"]);
        assert_eq!(check.unsatisfied(), vec!["db"]);
    }

    #[tokio::test]
    async fn test_unregister_active_fails_otherwise_succeeds() {
        let registry = registry_with(&["a", "b"]).await;
        drive_to_active(&registry, "a").await;

        let err = registry.unregister("a").await.unwrap_err();
        assert!(matches!(err, PluginError::InvalidState { .. }));
        assert!(registry.contains("a").await);

        registry.unregister("b").await.unwrap();
        assert!(registry.get("b").await.is_none());
        assert_eq!(registry.names().await, vec!["a"]);
    }

    #[tokio::test]
    async fn test_loading_clears_previous_instance() {
        let registry = registry_with(&["a"]).await;
        registry.set_state("a", PluginState::Loading).await.unwrap();
        registry.set_instance("a", Arc::new(Noop)).await.unwrap();
        registry.set_state("a", PluginState::Loading).await.unwrap();

        let entry = registry.get("a").await.unwrap();
        assert!(entry.instance.is_none());
        assert!(entry.loaded_at.is_none());
    }

    #[tokio::test]
    async fn test_list_sorted_and_names_in_registration_order() {
        let registry = registry_with(&["zeta", "alpha"]).await;
        let listed: Vec<_> = registry.list().await.into_iter().map(|s| s.name).collect();
        assert_eq!(listed, vec!["alpha", "zeta"]);
        assert_eq!(registry.names().await, vec!["zeta", "alpha"]);
        assert_eq!(registry.len().await, 2);
    }
}
