//! Constructors linked into the host binary.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::error::{PluginError, PluginResult};
use crate::subscription::panic_message;
use crate::traits::Plugin;

/// Zero-argument plugin constructor.
pub type PluginFactory = Arc<dyn Fn() -> Arc<dyn Plugin> + Send + Sync>;

/// Export name → constructor table.
#[derive(Clone, Default)]
pub struct BuiltinModules {
    factories: HashMap<String, PluginFactory>,
}

impl std::fmt::Debug for BuiltinModules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinModules")
            .field("exports", &self.names())
            .finish()
    }
}

impl BuiltinModules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the constructor for `export`.
    pub fn register<F>(&mut self, export: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn Plugin> + Send + Sync + 'static,
    {
        self.factories.insert(export.to_string(), Arc::new(factory));
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<F>(mut self, export: &str, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Plugin> + Send + Sync + 'static,
    {
        self.register(export, factory);
        self
    }

    pub fn contains(&self, export: &str) -> bool {
        self.factories.contains_key(export)
    }

    /// Registered export names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Constructs `export` for plugin `name`. A panicking constructor is a
    /// load error.
    pub fn construct(&self, name: &str, export: &str) -> PluginResult<Arc<dyn Plugin>> {
        let factory = self.factories.get(export).ok_or_else(|| {
            PluginError::load(name, format!("no builtin export named '{export}'"))
        })?;

        catch_unwind(AssertUnwindSafe(|| factory())).map_err(|panic| {
            PluginError::load(
                name,
                format!("constructor panicked: {}", panic_message(panic.as_ref())),
            )
        })
    }
}
