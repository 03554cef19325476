//! Hook and event facades scoped to one plugin.
//!
//! Registrations made through these facades are tagged with the owning
//! plugin so deactivation can remove them in one pass.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use keystone_core::AppResult;

use super::permissions::PermissionGuard;
use crate::error::PluginResult;
use crate::events::{Event, EventBus, EventHandler, FnEvent, SubscribeOptions};
use crate::hooks::{FnHook, HookHandler, HookOptions, HookPipeline};
use crate::subscription::SubscriptionId;

/// Hook access for one plugin.
#[derive(Debug, Clone)]
pub struct PluginHooks {
    owner: String,
    pipeline: HookPipeline,
    guard: PermissionGuard,
}

impl PluginHooks {
    pub(crate) fn new(owner: &str, pipeline: HookPipeline, guard: PermissionGuard) -> Self {
        Self {
            owner: owner.to_string(),
            pipeline,
            guard,
        }
    }

    /// Registers `handler` on `hook` with the given priority.
    pub async fn register(
        &self,
        hook: &str,
        handler: Arc<dyn HookHandler>,
        priority: i32,
    ) -> PluginResult<SubscriptionId> {
        self.guard.check_hook(hook)?;
        let options = HookOptions::with_priority(priority).owned_by(&self.owner);
        Ok(self.pipeline.register(hook, handler, options).await)
    }

    /// Registers an async closure on `hook`.
    pub async fn register_fn<F, Fut>(
        &self,
        hook: &str,
        priority: i32,
        f: F,
    ) -> PluginResult<SubscriptionId>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Value>> + Send + 'static,
    {
        self.register(hook, Arc::new(FnHook(f)), priority).await
    }

    /// Removes one of this plugin's registrations.
    pub async fn unregister(&self, hook: &str, id: SubscriptionId) -> bool {
        self.pipeline.unregister_owned(hook, id, &self.owner).await
    }

    /// Runs a hook chain. Plugins may fire hooks of their own.
    pub async fn trigger(&self, hook: &str, value: Value) -> Value {
        self.pipeline.trigger(hook, value).await
    }
}

/// Event access for one plugin.
#[derive(Debug, Clone)]
pub struct PluginEvents {
    owner: String,
    bus: EventBus,
    guard: PermissionGuard,
}

impl PluginEvents {
    pub(crate) fn new(owner: &str, bus: EventBus, guard: PermissionGuard) -> Self {
        Self {
            owner: owner.to_string(),
            bus,
            guard,
        }
    }

    async fn subscribe(
        &self,
        event: &str,
        handler: Arc<dyn EventHandler>,
        once: bool,
    ) -> PluginResult<SubscriptionId> {
        self.guard.check_event(event)?;
        let options = SubscribeOptions {
            once,
            owner: Some(self.owner.clone()),
        };
        Ok(self.bus.subscribe(event, handler, options).await)
    }

    /// Listens for every `event`.
    pub async fn on(&self, event: &str, handler: Arc<dyn EventHandler>) -> PluginResult<SubscriptionId> {
        self.subscribe(event, handler, false).await
    }

    /// Listens for the next `event` only.
    pub async fn once(
        &self,
        event: &str,
        handler: Arc<dyn EventHandler>,
    ) -> PluginResult<SubscriptionId> {
        self.subscribe(event, handler, true).await
    }

    /// Listens for every `event` with an async closure.
    pub async fn on_fn<F, Fut>(&self, event: &str, f: F) -> PluginResult<SubscriptionId>
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        self.on(event, Arc::new(FnEvent(f))).await
    }

    /// Removes one of this plugin's listeners.
    pub async fn off(&self, event: &str, id: SubscriptionId) -> bool {
        self.bus.off_owned(event, id, &self.owner).await
    }

    /// Emits `event` with this plugin as the source. Returns the number of
    /// listeners invoked.
    pub async fn emit(&self, event: &str, payload: Value) -> PluginResult<usize> {
        self.guard.check_event(event)?;
        Ok(self
            .bus
            .publish(Event::new(event, payload).with_source(&self.owner))
            .await)
    }
}
