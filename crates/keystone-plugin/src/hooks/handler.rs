//! Hook handler trait and closure adapter.

use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;

use keystone_core::AppResult;

/// A single transform in a hook chain.
///
/// Receives an owned copy of the carried value and returns the value to hand
/// to the next handler. Returning an error leaves the carried value unchanged.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Transforms the value.
    async fn handle(&self, value: Value) -> AppResult<Value>;
}

/// Adapts an async closure into a [`HookHandler`].
pub struct FnHook<F>(pub F);

#[async_trait]
impl<F, Fut> HookHandler for FnHook<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<Value>> + Send + 'static,
{
    async fn handle(&self, value: Value) -> AppResult<Value> {
        (self.0)(value).await
    }
}
