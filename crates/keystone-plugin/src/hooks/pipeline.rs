//! Hook pipeline that folds a value through every handler registered for a hook.
//!
//! Handlers run strictly in sequence, highest priority first and in
//! registration order on ties. A handler that fails or panics is logged and
//! skipped; the next handler receives the last successful output.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use keystone_core::{AppError, AppResult};

use super::handler::{FnHook, HookHandler};
use crate::subscription::{SubscriptionId, panic_message};

/// Registration options for a hook handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookOptions {
    /// Higher runs earlier. Defaults to 0.
    pub priority: i32,
    /// Plugin owning the handler, used for bulk removal and log lines.
    pub owner: Option<String>,
}

impl HookOptions {
    /// Options with the given priority and no owner.
    pub fn with_priority(priority: i32) -> Self {
        Self {
            priority,
            owner: None,
        }
    }

    /// Builder: tags the registration with an owning plugin.
    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

/// One handler registered on a hook.
#[derive(Clone)]
struct HookSubscription {
    id: SubscriptionId,
    handler: Arc<dyn HookHandler>,
    priority: i32,
    owner: Option<String>,
}

/// Shared, cloneable hook pipeline.
///
/// Clones share the same subscriptions.
#[derive(Clone, Default)]
pub struct HookPipeline {
    hooks: Arc<RwLock<HashMap<String, Vec<HookSubscription>>>>,
}

impl std::fmt::Debug for HookPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookPipeline").finish_non_exhaustive()
    }
}

impl HookPipeline {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler to `hook` and re-sorts the chain by descending priority.
    pub async fn register(
        &self,
        hook: &str,
        handler: Arc<dyn HookHandler>,
        options: HookOptions,
    ) -> SubscriptionId {
        let id = SubscriptionId::new();
        let mut hooks = self.hooks.write().await;
        let chain = hooks.entry(hook.to_string()).or_default();

        chain.push(HookSubscription {
            id,
            handler,
            priority: options.priority,
            owner: options.owner.clone(),
        });
        // Stable: ties keep insertion order.
        chain.sort_by_key(|s| Reverse(s.priority));

        debug!(
            hook = %hook,
            priority = options.priority,
            owner = options.owner.as_deref().unwrap_or("-"),
            "Hook handler registered"
        );
        id
    }

    /// Registers an async closure as a handler.
    pub async fn register_fn<F, Fut>(&self, hook: &str, options: HookOptions, f: F) -> SubscriptionId
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Value>> + Send + 'static,
    {
        self.register(hook, Arc::new(FnHook(f)), options).await
    }

    /// Removes one subscription. Returns whether it existed.
    pub async fn unregister(&self, hook: &str, id: SubscriptionId) -> bool {
        self.remove(hook, id, None).await
    }

    /// Removes one subscription only if `owner` registered it.
    pub async fn unregister_owned(&self, hook: &str, id: SubscriptionId, owner: &str) -> bool {
        self.remove(hook, id, Some(owner)).await
    }

    async fn remove(&self, hook: &str, id: SubscriptionId, owner: Option<&str>) -> bool {
        let mut hooks = self.hooks.write().await;
        let Some(chain) = hooks.get_mut(hook) else {
            return false;
        };
        let before = chain.len();
        chain.retain(|s| s.id != id || owner.is_some_and(|o| s.owner.as_deref() != Some(o)));
        let removed = chain.len() != before;
        if chain.is_empty() {
            hooks.remove(hook);
        }
        removed
    }

    /// Removes every subscription owned by `owner`. Returns how many were removed.
    pub async fn unregister_plugin(&self, owner: &str) -> usize {
        let mut hooks = self.hooks.write().await;
        let mut removed = 0;

        for chain in hooks.values_mut() {
            let before = chain.len();
            chain.retain(|s| s.owner.as_deref() != Some(owner));
            removed += before - chain.len();
        }
        hooks.retain(|_, chain| !chain.is_empty());

        if removed > 0 {
            debug!(owner = %owner, removed, "Hook handlers unregistered for plugin");
        }
        removed
    }

    /// Folds `initial` through every handler of `hook` and returns the result.
    ///
    /// Never fails: handler errors and panics are logged and the carried value
    /// is passed on unchanged.
    pub async fn trigger(&self, hook: &str, initial: Value) -> Value {
        // Snapshot so handlers may register or unregister without deadlocking.
        let chain = {
            let hooks = self.hooks.read().await;
            match hooks.get(hook) {
                Some(chain) => chain.clone(),
                None => return initial,
            }
        };

        let mut value = initial;
        for sub in chain {
            let owner = sub.owner.as_deref().unwrap_or("host");
            let outcome = AssertUnwindSafe(sub.handler.handle(value.clone()))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(next)) => value = next,
                Ok(Err(e)) => {
                    warn!(
                        hook = %hook,
                        plugin = %owner,
                        priority = sub.priority,
                        error = %e,
                        "Hook handler failed, continuing with previous value"
                    );
                }
                Err(panic) => {
                    error!(
                        hook = %hook,
                        plugin = %owner,
                        priority = sub.priority,
                        panic = %panic_message(panic.as_ref()),
                        "Hook handler panicked, continuing with previous value"
                    );
                }
            }
        }
        value
    }

    /// Runs [`trigger`](Self::trigger) in the background and discards the result.
    pub fn trigger_async(&self, hook: &str, initial: Value) -> JoinHandle<()> {
        let pipeline = self.clone();
        let hook = hook.to_string();
        tokio::spawn(async move {
            let _ = pipeline.trigger(&hook, initial).await;
        })
    }

    /// Typed trigger: serializes `initial`, folds it, and deserializes the result.
    pub async fn trigger_as<T>(&self, hook: &str, initial: T) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let value = serde_json::to_value(initial)?;
        let result = self.trigger(hook, value).await;
        serde_json::from_value(result).map_err(|e| {
            AppError::validation(format!("Hook '{hook}' produced a value of the wrong shape: {e}"))
        })
    }

    /// Number of handlers registered on `hook`.
    pub async fn handler_count(&self, hook: &str) -> usize {
        let hooks = self.hooks.read().await;
        hooks.get(hook).map(Vec::len).unwrap_or(0)
    }

    /// Names of all hooks with at least one handler, sorted.
    pub async fn hooks(&self) -> Vec<String> {
        let hooks = self.hooks.read().await;
        let mut names: Vec<String> = hooks.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn num(v: &Value) -> i64 {
        v.as_i64().unwrap()
    }

    #[tokio::test]
    async fn test_priority_order_double_then_add() {
        let pipeline = HookPipeline::new();
        pipeline
            .register_fn("x", HookOptions::with_priority(10), |v| async move {
                Ok(json!(num(&v) * 2))
            })
            .await;
        pipeline
            .register_fn("x", HookOptions::with_priority(5), |v| async move {
                Ok(json!(num(&v) + 1))
            })
            .await;

        assert_eq!(pipeline.trigger("x", json!(3)).await, json!(7));
    }

    #[tokio::test]
    async fn test_registration_order_does_not_override_priority() {
        let pipeline = HookPipeline::new();
        pipeline
            .register_fn("x", HookOptions::with_priority(5), |v| async move {
                Ok(json!(num(&v) + 1))
            })
            .await;
        pipeline
            .register_fn("x", HookOptions::with_priority(10), |v| async move {
                Ok(json!(num(&v) * 2))
            })
            .await;

        assert_eq!(pipeline.trigger("x", json!(3)).await, json!(7));
    }

    #[tokio::test]
    async fn test_ties_run_in_registration_order() {
        let pipeline = HookPipeline::new();
        for suffix in ["a", "b", "c"] {
            pipeline
                .register_fn("s", HookOptions::default(), move |v| async move {
                    Ok(json!(format!("{}{}", v.as_str().unwrap(), suffix)))
                })
                .await;
        }
        assert_eq!(pipeline.trigger("s", json!("")).await, json!("abc"));
    }

    #[tokio::test]
    async fn test_failing_handler_carries_previous_value_forward() {
        let pipeline = HookPipeline::new();
        pipeline
            .register_fn("x", HookOptions::with_priority(3), |v| async move {
                Ok(json!(num(&v) + 10))
            })
            .await;
        pipeline
            .register_fn("x", HookOptions::with_priority(2), |_| async move {
                Err(AppError::internal("boom"))
            })
            .await;
        pipeline
            .register_fn("x", HookOptions::with_priority(1), |v| async move {
                Ok(json!(num(&v) * 3))
            })
            .await;

        // 1 -> 11 -> (fails, stays 11) -> 33
        assert_eq!(pipeline.trigger("x", json!(1)).await, json!(33));
    }

    #[tokio::test]
    async fn test_first_handler_failure_keeps_initial_value() {
        let pipeline = HookPipeline::new();
        pipeline
            .register_fn("x", HookOptions::with_priority(9), |_| async move {
                Err(AppError::internal("boom"))
            })
            .await;
        assert_eq!(pipeline.trigger("x", json!(5)).await, json!(5));
    }

    #[tokio::test]
    async fn test_panicking_handler_is_isolated() {
        let pipeline = HookPipeline::new();
        pipeline
            .register_fn("x", HookOptions::with_priority(2), |_v: Value| async move {
                if true {
                    panic!("handler bug");
                }
                Ok(Value::Null)
            })
            .await;
        pipeline
            .register_fn("x", HookOptions::with_priority(1), |v| async move {
                Ok(json!(num(&v) + 1))
            })
            .await;

        assert_eq!(pipeline.trigger("x", json!(1)).await, json!(2));
    }

    #[tokio::test]
    async fn test_unknown_hook_returns_input() {
        let pipeline = HookPipeline::new();
        assert_eq!(pipeline.trigger("none", json!({"a": 1})).await, json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_unregister_by_id_and_owner() {
        let pipeline = HookPipeline::new();
        let id = pipeline
            .register_fn("x", HookOptions::default(), |v| async move { Ok(v) })
            .await;
        pipeline
            .register_fn("x", HookOptions::default().owned_by("p"), |v| async move { Ok(v) })
            .await;
        pipeline
            .register_fn("y", HookOptions::default().owned_by("p"), |v| async move { Ok(v) })
            .await;

        assert_eq!(pipeline.handler_count("x").await, 2);
        assert!(pipeline.unregister("x", id).await);
        assert!(!pipeline.unregister("x", id).await);
        assert_eq!(pipeline.unregister_plugin("p").await, 2);
        assert!(pipeline.hooks().await.is_empty());
    }

    #[tokio::test]
    async fn test_unregister_owned_checks_owner() {
        let pipeline = HookPipeline::new();
        let id = pipeline
            .register_fn("x", HookOptions::default().owned_by("a"), |v| async move { Ok(v) })
            .await;

        assert!(!pipeline.unregister_owned("x", id, "b").await);
        assert_eq!(pipeline.handler_count("x").await, 1);
        assert!(pipeline.unregister_owned("x", id, "a").await);
        assert_eq!(pipeline.handler_count("x").await, 0);
    }

    #[tokio::test]
    async fn test_trigger_as_typed() {
        #[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
        struct Req {
            difficulty: Option<String>,
        }

        let pipeline = HookPipeline::new();
        pipeline
            .register_fn("before", HookOptions::default(), |mut v| async move {
                v["difficulty"] = json!("easy");
                Ok(v)
            })
            .await;

        let out = pipeline
            .trigger_as("before", Req { difficulty: None })
            .await
            .unwrap();
        assert_eq!(out.difficulty.as_deref(), Some("easy"));
    }

    #[tokio::test]
    async fn test_trigger_async_runs_in_background() {
        let pipeline = HookPipeline::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = Arc::new(std::sync::Mutex::new(Some(tx)));
        pipeline
            .register_fn("notify", HookOptions::default(), move |v| {
                let tx = tx.clone();
                async move {
                    if let Some(tx) = tx.lock().unwrap().take() {
                        let _ = tx.send(v.clone());
                    }
                    Ok(v)
                }
            })
            .await;

        pipeline.trigger_async("notify", json!("hi")).await.unwrap();
        assert_eq!(rx.await.unwrap(), json!("hi"));
    }
}
