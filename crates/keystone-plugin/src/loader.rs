//! Plugin loader: drives discovered plugins through their lifecycle in
//! dependency order.
//!
//! The loader never mutates registry entries directly; every state change
//! goes through [`PluginRegistry`]. Plugins are started strictly one at a
//! time in dependency order and stopped in reverse activation order.

use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use keystone_core::config::PluginConfig;
use keystone_core::{AppError, AppResult};

use crate::api::context::{ContextParts, PluginContext};
use crate::discovery::{self, DiscoveredPlugin};
use crate::error::{LifecyclePhase, PluginError, PluginResult};
use crate::events::EventBus;
use crate::graph::{self, LoadOrder};
use crate::hooks::HookPipeline;
use crate::module::{BuiltinModules, ModuleLoader, ModuleResolver};
use crate::registry::{PluginRegistry, RegistryEntry};
use crate::state::PluginState;
use crate::subscription::panic_message;
use crate::traits::{Plugin, ProviderKind};

/// Options for [`PluginLoader::load_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Log a failing plugin and move on instead of aborting the batch.
    pub skip_errors: bool,
}

/// A plugin that failed during a batch operation.
#[derive(Debug, Clone)]
pub struct PluginFailure {
    /// Plugin name.
    pub name: String,
    /// What went wrong.
    pub error: PluginError,
}

/// Outcome of [`PluginLoader::load_all`].
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Plugins activated by this call, in activation order.
    pub activated: Vec<String>,
    /// Plugins that failed to load, initialize, or activate.
    pub failed: Vec<PluginFailure>,
    /// Plugins excluded because of a dependency cycle.
    pub cyclic: Vec<String>,
    /// Plugins that were already active.
    pub skipped: Vec<String>,
}

/// Outcome of [`PluginLoader::shutdown_all`].
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    /// Plugins shut down cleanly, in shutdown order.
    pub stopped: Vec<String>,
    /// Plugins whose teardown failed.
    pub failed: Vec<PluginFailure>,
}

/// Orchestrates every plugin's lifecycle.
pub struct PluginLoader {
    config: PluginConfig,
    modules: Arc<dyn ModuleLoader>,
    registry: Arc<PluginRegistry>,
    hooks: HookPipeline,
    events: EventBus,
    /// Names in the order they reached `ACTIVE`.
    activation_order: RwLock<Vec<String>>,
}

impl std::fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginLoader")
            .field("directory", &self.config.directory)
            .finish_non_exhaustive()
    }
}

impl PluginLoader {
    /// Creates a loader resolving modules with `modules`.
    pub fn new(config: PluginConfig, modules: Arc<dyn ModuleLoader>) -> Self {
        let events = EventBus::new();
        Self {
            config,
            modules,
            registry: Arc::new(PluginRegistry::new(events.clone())),
            hooks: HookPipeline::new(),
            events,
            activation_order: RwLock::new(Vec::new()),
        }
    }

    /// Creates a loader backed by the default resolver with `builtins`.
    pub fn with_builtins(config: PluginConfig, builtins: BuiltinModules) -> Self {
        Self::new(config, Arc::new(ModuleResolver::new(builtins)))
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Pipeline shared by the host and every plugin.
    pub fn hooks(&self) -> &HookPipeline {
        &self.hooks
    }

    /// Bus shared by the host, the registry, and every plugin.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Scans the configured plugin directory. No registry side effects.
    pub async fn discover(&self) -> Vec<DiscoveredPlugin> {
        let root = Path::new(&self.config.directory);
        let found = discovery::scan(root, &self.config.manifest_file).await;
        info!(
            directory = %self.config.directory,
            count = found.len(),
            "Plugin discovery complete"
        );
        found
    }

    /// Orders `discovered` so required dependencies come first.
    pub fn resolve_load_order(&self, discovered: &[DiscoveredPlugin]) -> LoadOrder {
        graph::resolve_load_order(discovered)
    }

    /// Loads the plugin's entry artifact and constructs an instance.
    ///
    /// Returns the existing instance when already loaded, unless `force`.
    pub async fn load(&self, name: &str, force: bool) -> PluginResult<Arc<dyn Plugin>> {
        let entry = self.entry(name).await?;

        if let Some(instance) = &entry.instance {
            if !force {
                debug!(plugin = %name, state = %entry.state, "Plugin already loaded");
                return Ok(instance.clone());
            }
            if entry.state == PluginState::Active {
                return Err(PluginError::invalid_state(
                    name,
                    entry.state,
                    "deactivate the plugin before reloading it",
                ));
            }
        }

        self.registry.set_state(name, PluginState::Loading).await?;

        let instance = match self
            .modules
            .load_module(name, &entry.source_path, &entry.manifest.main)
            .await
        {
            Ok(instance) => instance,
            Err(e) => {
                self.record_failure(name, &e).await;
                return Err(e);
            }
        };

        let reported = instance.metadata();
        if reported.name != name {
            warn!(
                plugin = %name,
                reported = %reported.name,
                "Plugin metadata name differs from manifest name"
            );
        }

        self.registry.set_instance(name, instance.clone()).await?;
        info!(plugin = %name, version = %entry.version, "Plugin loaded");
        Ok(instance)
    }

    /// Checks dependencies, prepares the data directory and context, and
    /// calls the plugin's `initialize`.
    pub async fn initialize(&self, name: &str) -> PluginResult<()> {
        let entry = self.entry(name).await?;

        if entry.state == PluginState::Active {
            warn!(plugin = %name, "Plugin already active, skipping initialize");
            return Ok(());
        }
        let instance = match (entry.state, &entry.instance) {
            (PluginState::Loaded, Some(instance)) => instance.clone(),
            _ => {
                return Err(PluginError::invalid_state(
                    name,
                    entry.state,
                    "plugin must be loaded before initialize",
                ));
            }
        };

        let check = self.registry.validate_dependencies(name).await?;
        if !check.is_valid() {
            let err = PluginError::Dependency {
                name: name.to_string(),
                unsatisfied: check.unsatisfied(),
            };
            self.record_failure(name, &err).await;
            return Err(err);
        }

        let data_dir = Path::new(&self.config.data_directory).join(name);
        if let Err(e) = tokio::fs::create_dir_all(&data_dir).await {
            let err = PluginError::lifecycle(name, LifecyclePhase::Initialize, AppError::from(e));
            self.record_failure(name, &err).await;
            return Err(err);
        }

        let context = PluginContext::new(
            ContextParts {
                name: name.to_string(),
                config: self.merged_config(&entry),
                data_dir,
                hooks: self.hooks.clone(),
                events: self.events.clone(),
                permissions: entry.manifest.permissions.clone(),
                enforce_permissions: self.config.enforce_permissions,
            },
            &self.registry,
        );

        self.registry
            .set_state(name, PluginState::Initializing)
            .await?;
        self.registry.set_context(name, context.clone()).await?;

        self.run_phase(name, LifecyclePhase::Initialize, instance.initialize(context))
            .await?;
        info!(plugin = %name, "Plugin initialized");
        Ok(())
    }

    /// Calls the plugin's `activate` and marks it `ACTIVE`.
    pub async fn activate(&self, name: &str) -> PluginResult<()> {
        let entry = self.entry(name).await?;
        if entry.state == PluginState::Active {
            return Ok(());
        }
        let instance = match (entry.state, &entry.instance) {
            (PluginState::Initializing, Some(instance)) => instance.clone(),
            _ => {
                return Err(PluginError::invalid_state(
                    name,
                    entry.state,
                    "plugin must be initialized before activate",
                ));
            }
        };

        self.run_phase(name, LifecyclePhase::Activate, instance.activate())
            .await?;
        self.registry.set_state(name, PluginState::Active).await?;

        let mut order = self.activation_order.write().await;
        order.retain(|n| n != name);
        order.push(name.to_string());
        drop(order);

        info!(plugin = %name, "Plugin activated");
        Ok(())
    }

    /// Calls the plugin's `deactivate` and removes its hooks and listeners.
    pub async fn deactivate(&self, name: &str) -> PluginResult<()> {
        let entry = self.entry(name).await?;
        match entry.state {
            PluginState::Active => {}
            PluginState::ShuttingDown | PluginState::ShutDown => return Ok(()),
            state => {
                return Err(PluginError::invalid_state(
                    name,
                    state,
                    "only an active plugin can be deactivated",
                ));
            }
        }

        self.registry
            .set_state(name, PluginState::ShuttingDown)
            .await?;

        let result = match &entry.instance {
            Some(instance) => {
                self.run_phase(name, LifecyclePhase::Deactivate, instance.deactivate())
                    .await
            }
            None => Ok(()),
        };
        self.release_subscriptions(name).await;
        result
    }

    /// Shuts the plugin down, deactivating it first if needed.
    ///
    /// A no-op for plugins that were never loaded or are already shut down.
    pub async fn shutdown(&self, name: &str) -> PluginResult<()> {
        let mut entry = self.entry(name).await?;

        match entry.state {
            PluginState::Unloaded | PluginState::Loading | PluginState::ShutDown => {
                debug!(plugin = %name, state = %entry.state, "Nothing to shut down");
                return Ok(());
            }
            PluginState::Error => {
                self.shutdown_failed(name, &entry).await;
                return Ok(());
            }
            PluginState::Active => {
                if let Err(e) = self.deactivate(name).await {
                    self.shutdown_failed(name, &entry).await;
                    return Err(e);
                }
                entry = self.entry(name).await?;
            }
            PluginState::Loaded | PluginState::Initializing => {
                self.registry
                    .set_state(name, PluginState::ShuttingDown)
                    .await?;
            }
            PluginState::ShuttingDown => {}
        }

        if let Some(instance) = &entry.instance {
            self.run_phase(name, LifecyclePhase::Shutdown, instance.shutdown())
                .await?;
        }
        self.release_subscriptions(name).await;
        self.registry.set_state(name, PluginState::ShutDown).await?;
        info!(plugin = %name, "Plugin shut down");
        Ok(())
    }

    /// Shuts the plugin down if needed and removes it from the registry.
    pub async fn unload(&self, name: &str) -> PluginResult<RegistryEntry> {
        if let Err(e) = self.shutdown(name).await {
            warn!(plugin = %name, error = %e, "Shutdown failed during unload");
        }
        self.release_subscriptions(name).await;
        let removed = self.registry.unregister(name).await?;
        self.activation_order.write().await.retain(|n| n != name);
        Ok(removed)
    }

    /// Discovers, registers, orders, and starts every plugin.
    ///
    /// Already registered plugins are kept; already active ones are skipped.
    /// With `skip_errors` unset the first failure aborts the call.
    pub async fn load_all(&self, options: LoadOptions) -> PluginResult<LoadReport> {
        let discovered = self.discover().await;

        for plugin in &discovered {
            if self.registry.contains(&plugin.name).await {
                continue;
            }
            self.registry
                .register(&plugin.name, plugin.manifest.clone(), &plugin.path)
                .await?;
        }

        let order = self.resolve_load_order(&discovered);
        let mut report = LoadReport::default();

        for name in &order.cyclic {
            let err = PluginError::CircularDependency(order.cyclic.clone());
            self.record_failure(name, &err).await;
            report.cyclic.push(name.clone());
        }

        for name in &order.order {
            if self.registry.state(name).await == Some(PluginState::Active) {
                report.skipped.push(name.clone());
                continue;
            }

            match self.start(name).await {
                Ok(()) => report.activated.push(name.clone()),
                Err(e) if options.skip_errors => {
                    error!(plugin = %name, error = %e, "Plugin failed to start, continuing");
                    report.failed.push(PluginFailure {
                        name: name.clone(),
                        error: e,
                    });
                }
                Err(e) => {
                    error!(plugin = %name, error = %e, "Plugin failed to start, aborting");
                    return Err(e);
                }
            }
        }

        info!(
            activated = report.activated.len(),
            failed = report.failed.len(),
            cyclic = report.cyclic.len(),
            skipped = report.skipped.len(),
            "Plugin load complete"
        );
        Ok(report)
    }

    /// Shuts down every active plugin in reverse activation order. Individual
    /// failures are logged and never stop the sweep.
    pub async fn shutdown_all(&self) -> ShutdownReport {
        let order = self.activation_order.read().await.clone();
        let mut report = ShutdownReport::default();

        for name in order.iter().rev() {
            if self.registry.state(name).await != Some(PluginState::Active) {
                continue;
            }
            match self.shutdown(name).await {
                Ok(()) => report.stopped.push(name.clone()),
                Err(e) => {
                    error!(plugin = %name, error = %e, "Plugin shutdown failed");
                    report.failed.push(PluginFailure {
                        name: name.clone(),
                        error: e,
                    });
                }
            }
        }

        info!(
            stopped = report.stopped.len(),
            failed = report.failed.len(),
            "All plugins shut down"
        );
        report
    }

    /// Health of every active plugin. A panicking check counts as unhealthy.
    pub async fn health_check_all(&self) -> BTreeMap<String, bool> {
        let mut health = BTreeMap::new();
        for name in self.registry.names().await {
            let Some(instance) = self.registry.get_active_instance(&name).await else {
                continue;
            };
            let healthy = AssertUnwindSafe(instance.health_check())
                .catch_unwind()
                .await
                .unwrap_or(false);
            if !healthy {
                warn!(plugin = %name, "Plugin health check failed");
            }
            health.insert(name, healthy);
        }
        health
    }

    /// Names in the order they were activated.
    pub async fn load_order(&self) -> Vec<String> {
        self.activation_order.read().await.clone()
    }

    /// First active plugin exposing a storage provider.
    pub async fn storage_provider(&self) -> Option<Arc<dyn Plugin>> {
        self.registry
            .find_provider(ProviderKind::Storage)
            .await
            .map(|(_, plugin)| plugin)
    }

    /// First active plugin exposing an LLM provider.
    pub async fn llm_provider(&self) -> Option<Arc<dyn Plugin>> {
        self.registry
            .find_provider(ProviderKind::Llm)
            .await
            .map(|(_, plugin)| plugin)
    }

    /// Load, initialize, and activate one plugin.
    async fn start(&self, name: &str) -> PluginResult<()> {
        let reload = matches!(
            self.registry.state(name).await,
            Some(PluginState::Error | PluginState::ShutDown)
        );
        self.load(name, reload).await?;
        self.initialize(name).await?;
        self.activate(name).await
    }

    async fn entry(&self, name: &str) -> PluginResult<RegistryEntry> {
        self.registry
            .get(name)
            .await
            .ok_or_else(|| PluginError::NotFound(name.to_string()))
    }

    /// Manifest defaults with the host's override object merged on top.
    fn merged_config(&self, entry: &RegistryEntry) -> Map<String, Value> {
        let mut config = entry.manifest.config.clone();
        match self.config.overrides.get(&entry.name) {
            Some(Value::Object(overrides)) => {
                for (key, value) in overrides {
                    config.insert(key.clone(), value.clone());
                }
            }
            Some(other) => {
                warn!(plugin = %entry.name, value = %other, "Ignoring non-object config override");
            }
            None => {}
        }
        config
    }

    /// Runs one lifecycle call with panic isolation and the optional timeout.
    /// Failures are recorded on the registry before being returned.
    async fn run_phase<F>(&self, name: &str, phase: LifecyclePhase, call: F) -> PluginResult<()>
    where
        F: Future<Output = AppResult<()>>,
    {
        let guarded = AssertUnwindSafe(call).catch_unwind();
        let outcome = match self.config.lifecycle_timeout() {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let err = PluginError::Timeout {
                        name: name.to_string(),
                        phase,
                        timeout: limit,
                    };
                    self.record_failure(name, &err).await;
                    return Err(err);
                }
            },
            None => guarded.await,
        };

        let result = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(source)) => PluginError::lifecycle(name, phase, source),
            Err(panic) => PluginError::lifecycle(
                name,
                phase,
                AppError::plugin(format!("panicked: {}", panic_message(panic.as_ref()))),
            ),
        };
        self.record_failure(name, &result).await;
        Err(result)
    }

    /// Best-effort teardown of a plugin already in `ERROR`.
    async fn shutdown_failed(&self, name: &str, entry: &RegistryEntry) {
        if let Some(instance) = &entry.instance {
            let outcome = AssertUnwindSafe(instance.shutdown()).catch_unwind().await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(plugin = %name, error = %e, "Shutdown of failed plugin errored"),
                Err(panic) => warn!(
                    plugin = %name,
                    panic = %panic_message(panic.as_ref()),
                    "Shutdown of failed plugin panicked"
                ),
            }
        }
        self.release_subscriptions(name).await;
    }

    async fn release_subscriptions(&self, name: &str) {
        let hooks = self.hooks.unregister_plugin(name).await;
        let listeners = self.events.off_owner(name).await;
        if hooks + listeners > 0 {
            debug!(plugin = %name, hooks, listeners, "Released plugin subscriptions");
        }
    }

    async fn record_failure(&self, name: &str, error: &PluginError) {
        error!(plugin = %name, error = %error, "Plugin lifecycle failure");
        if let Err(e) = self.registry.set_error(name, error.clone()).await {
            warn!(plugin = %name, error = %e, "Could not record plugin failure");
        }
        // Handlers of a failed plugin must not keep running.
        self.release_subscriptions(name).await;
    }
}
