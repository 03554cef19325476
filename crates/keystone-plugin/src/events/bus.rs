//! Publish/subscribe event bus.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use keystone_core::AppResult;

use crate::subscription::{SubscriptionId, panic_message};

/// Subscribing to this name receives every event.
pub const WILDCARD: &str = "*";

/// A notification delivered to listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event name, e.g. `session:completed`.
    pub name: String,
    /// Arbitrary JSON payload.
    pub payload: Value,
    /// Emitting plugin, if any.
    pub source: Option<String>,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Creates an event stamped with the current time.
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
            source: None,
            timestamp: Utc::now(),
        }
    }

    /// Builder: records the emitting plugin.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Listener invoked for each matching event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handles one event. Errors are logged by the bus and go no further.
    async fn handle(&self, event: Event) -> AppResult<()>;
}

/// Adapts an async closure into an [`EventHandler`].
pub struct FnEvent<F>(pub F);

#[async_trait]
impl<F, Fut> EventHandler for FnEvent<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<()>> + Send + 'static,
{
    async fn handle(&self, event: Event) -> AppResult<()> {
        (self.0)(event).await
    }
}

/// Subscription options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Remove the subscription after its first delivery.
    pub once: bool,
    /// Plugin owning the subscription, used for bulk removal.
    pub owner: Option<String>,
}

#[derive(Clone)]
struct EventSubscription {
    id: SubscriptionId,
    handler: Arc<dyn EventHandler>,
    once: bool,
    owner: Option<String>,
}

/// Shared, cloneable event bus.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<RwLock<HashMap<String, Vec<EventSubscription>>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener for `event` (or [`WILDCARD`]).
    pub async fn subscribe(
        &self,
        event: &str,
        handler: Arc<dyn EventHandler>,
        options: SubscribeOptions,
    ) -> SubscriptionId {
        let id = SubscriptionId::new();
        let mut listeners = self.listeners.write().await;
        listeners
            .entry(event.to_string())
            .or_default()
            .push(EventSubscription {
                id,
                handler,
                once: options.once,
                owner: options.owner,
            });
        id
    }

    /// Adds a persistent listener.
    pub async fn on(&self, event: &str, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        self.subscribe(event, handler, SubscribeOptions::default())
            .await
    }

    /// Adds a listener removed after its first delivery.
    pub async fn once(&self, event: &str, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        let options = SubscribeOptions {
            once: true,
            owner: None,
        };
        self.subscribe(event, handler, options).await
    }

    /// Adds a persistent closure listener.
    pub async fn on_fn<F, Fut>(&self, event: &str, f: F) -> SubscriptionId
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        self.on(event, Arc::new(FnEvent(f))).await
    }

    /// Removes one listener. Returns whether it existed.
    pub async fn off(&self, event: &str, id: SubscriptionId) -> bool {
        self.remove(event, id, None).await
    }

    /// Removes one listener only if `owner` subscribed it.
    pub async fn off_owned(&self, event: &str, id: SubscriptionId, owner: &str) -> bool {
        self.remove(event, id, Some(owner)).await
    }

    async fn remove(&self, event: &str, id: SubscriptionId, owner: Option<&str>) -> bool {
        let mut listeners = self.listeners.write().await;
        let Some(subs) = listeners.get_mut(event) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|s| s.id != id || owner.is_some_and(|o| s.owner.as_deref() != Some(o)));
        let removed = subs.len() != before;
        if subs.is_empty() {
            listeners.remove(event);
        }
        removed
    }

    /// Removes every listener owned by `owner`. Returns how many were removed.
    pub async fn off_owner(&self, owner: &str) -> usize {
        let mut listeners = self.listeners.write().await;
        let mut removed = 0;
        for subs in listeners.values_mut() {
            let before = subs.len();
            subs.retain(|s| s.owner.as_deref() != Some(owner));
            removed += before - subs.len();
        }
        listeners.retain(|_, subs| !subs.is_empty());
        removed
    }

    /// Emits an event with no source. Returns the number of listeners invoked.
    pub async fn emit(&self, event: &str, payload: Value) -> usize {
        self.publish(Event::new(event, payload)).await
    }

    /// Delivers `event` to its named listeners in registration order, then to
    /// wildcard listeners. Each listener is isolated: errors and panics are
    /// logged and the remaining listeners still run.
    pub async fn publish(&self, event: Event) -> usize {
        let targets = self.take_targets(&event.name).await;
        if targets.is_empty() {
            debug!(event = %event.name, "Event emitted with no listeners");
            return 0;
        }

        for sub in &targets {
            let owner = sub.owner.as_deref().unwrap_or("host");
            let outcome = AssertUnwindSafe(sub.handler.handle(event.clone()))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(event = %event.name, plugin = %owner, error = %e, "Event listener failed");
                }
                Err(panic) => {
                    error!(
                        event = %event.name,
                        plugin = %owner,
                        panic = %panic_message(panic.as_ref()),
                        "Event listener panicked"
                    );
                }
            }
        }
        targets.len()
    }

    /// Collects listeners for `name` and drops `once` subscriptions before
    /// they run, so re-entrant emits never deliver them twice.
    async fn take_targets(&self, name: &str) -> Vec<EventSubscription> {
        let mut listeners = self.listeners.write().await;
        let mut targets = Vec::new();

        let mut keys = vec![name];
        if name != WILDCARD {
            keys.push(WILDCARD);
        }

        for key in keys {
            if let Some(subs) = listeners.get_mut(key) {
                targets.extend(subs.iter().cloned());
                subs.retain(|s| !s.once);
                if subs.is_empty() {
                    listeners.remove(key);
                }
            }
        }
        targets
    }

    /// Number of listeners on `event`, excluding wildcard listeners.
    pub async fn listener_count(&self, event: &str) -> usize {
        let listeners = self.listeners.read().await;
        listeners.get(event).map(Vec::len).unwrap_or(0)
    }

    /// Names with at least one listener, sorted.
    pub async fn events(&self) -> Vec<String> {
        let listeners = self.listeners.read().await;
        let mut names: Vec<String> = listeners.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_core::AppError;
    use serde_json::json;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Arc<dyn EventHandler>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log2 = log.clone();
        let make = move |tag: &'static str| -> Arc<dyn EventHandler> {
            let log = log2.clone();
            Arc::new(FnEvent(move |e: Event| {
                let log = log.clone();
                async move {
                    log.lock().unwrap().push(format!("{tag}:{}", e.name));
                    Ok(())
                }
            }))
        };
        (log, make)
    }

    #[tokio::test]
    async fn test_listeners_run_in_registration_order() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        bus.on("session:started", make("a")).await;
        bus.on("session:started", make("b")).await;

        assert_eq!(bus.emit("session:started", json!({})).await, 2);
        assert_eq!(*log.lock().unwrap(), vec!["a:session:started", "b:session:started"]);
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_block_siblings() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        bus.on_fn("e", |_| async move { Err(AppError::internal("nope")) })
            .await;
        bus.on_fn("e", |_| async move {
            if true {
                panic!("listener bug");
            }
            Ok(())
        })
        .await;
        bus.on("e", make("ok")).await;

        assert_eq!(bus.emit("e", Value::Null).await, 3);
        assert_eq!(*log.lock().unwrap(), vec!["ok:e"]);
    }

    #[tokio::test]
    async fn test_once_delivers_a_single_time() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        bus.once("e", make("once")).await;

        bus.emit("e", Value::Null).await;
        bus.emit("e", Value::Null).await;
        assert_eq!(log.lock().unwrap().len(), 1);
        assert_eq!(bus.listener_count("e").await, 0);
    }

    #[tokio::test]
    async fn test_wildcard_runs_after_named() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        bus.on(WILDCARD, make("all")).await;
        bus.on("x", make("x")).await;

        bus.emit("x", Value::Null).await;
        bus.emit("y", Value::Null).await;
        assert_eq!(*log.lock().unwrap(), vec!["x:x", "all:x", "all:y"]);
    }

    #[tokio::test]
    async fn test_off_and_off_owner() {
        let bus = EventBus::new();
        let (_log, make) = recorder();
        let id = bus.on("e", make("a")).await;
        let owned = SubscribeOptions {
            once: false,
            owner: Some("p".into()),
        };
        bus.subscribe("e", make("b"), owned.clone()).await;
        bus.subscribe("f", make("c"), owned).await;

        assert!(bus.off("e", id).await);
        assert!(!bus.off("e", id).await);
        assert_eq!(bus.off_owner("p").await, 2);
        assert!(bus.events().await.is_empty());
        assert_eq!(bus.emit("e", Value::Null).await, 0);
    }

    #[tokio::test]
    async fn test_off_owned_ignores_foreign_listeners() {
        let bus = EventBus::new();
        let (_log, make) = recorder();
        let owned = SubscribeOptions {
            once: false,
            owner: Some("p".into()),
        };
        let id = bus.subscribe("e", make("a"), owned).await;

        assert!(!bus.off_owned("e", id, "q").await);
        assert_eq!(bus.listener_count("e").await, 1);
        assert!(bus.off_owned("e", id, "p").await);
        assert_eq!(bus.listener_count("e").await, 0);
    }

    #[tokio::test]
    async fn test_publish_carries_source() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(None));
        let seen2 = seen.clone();
        bus.on_fn("e", move |e| {
            let seen = seen2.clone();
            async move {
                *seen.lock().unwrap() = e.source.clone();
                Ok(())
            }
        })
        .await;

        bus.publish(Event::new("e", Value::Null).with_source("storage"))
            .await;
        assert_eq!(seen.lock().unwrap().as_deref(), Some("storage"));
    }
}
