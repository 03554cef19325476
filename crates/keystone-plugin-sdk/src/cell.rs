//! Holder for the context a plugin receives in `initialize`.

use std::sync::OnceLock;

use serde::de::DeserializeOwned;

use keystone_core::{AppError, AppResult};
use keystone_plugin::PluginContext;

/// Write-once slot for a [`PluginContext`].
///
/// Plugin methods take `&self`, so the context handed to `initialize` needs
/// interior storage. A fresh instance is constructed on every (re)load, so
/// one write per instance is enough.
#[derive(Debug, Default)]
pub struct ContextCell {
    inner: OnceLock<PluginContext>,
}

impl ContextCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the context. Fails if one was already stored.
    pub fn set(&self, context: PluginContext) -> AppResult<()> {
        let name = context.name().to_string();
        self.inner
            .set(context)
            .map_err(|_| AppError::conflict(format!("Plugin '{name}' was already initialized")))
    }

    /// The stored context, or an error before `initialize`.
    pub fn get(&self) -> AppResult<&PluginContext> {
        self.inner
            .get()
            .ok_or_else(|| AppError::plugin("Plugin has not been initialized"))
    }

    pub fn is_set(&self) -> bool {
        self.inner.get().is_some()
    }

    /// Typed configuration value, or `default` when absent, mistyped, or
    /// before `initialize`.
    pub fn config_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.inner
            .get()
            .and_then(|ctx| ctx.config_value(key))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_once() {
        let cell = ContextCell::new();
        assert!(cell.get().is_err());
        assert_eq!(cell.config_or("limit", 7u32), 7);

        cell.set(PluginContext::standalone("p", "/tmp/p")).unwrap();
        assert!(cell.is_set());
        assert_eq!(cell.get().unwrap().name(), "p");

        let err = cell
            .set(PluginContext::standalone("p", "/tmp/p"))
            .unwrap_err();
        assert!(err.message.contains("already initialized"));
    }
}
