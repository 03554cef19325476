//! Module loading: turns a manifest's `main` into a plugin instance.
//!
//! `builtin:<export>` entries resolve against constructors linked into the
//! host; anything else is a path, relative to the plugin directory, to a
//! shared library.

pub mod builtin;
pub mod dynamic;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{PluginError, PluginResult};
use crate::traits::Plugin;

pub use builtin::{BuiltinModules, PluginFactory};
pub use dynamic::DynamicModules;

/// Prefix marking an entry as a builtin export.
pub const BUILTIN_PREFIX: &str = "builtin:";

/// Constructs plugin instances from manifest entries.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Loads `entry` for plugin `name` located in `dir` and constructs one
    /// instance.
    async fn load_module(&self, name: &str, dir: &Path, entry: &str) -> PluginResult<Arc<dyn Plugin>>;
}

/// Default [`ModuleLoader`]: builtins first, shared libraries otherwise.
#[derive(Debug, Default)]
pub struct ModuleResolver {
    builtins: BuiltinModules,
    dynamic: DynamicModules,
}

impl ModuleResolver {
    /// Creates a resolver with the given builtin table.
    pub fn new(builtins: BuiltinModules) -> Self {
        Self {
            builtins,
            dynamic: DynamicModules::new(),
        }
    }

    /// Builtin constructors known to this resolver.
    pub fn builtins(&self) -> &BuiltinModules {
        &self.builtins
    }
}

#[async_trait]
impl ModuleLoader for ModuleResolver {
    async fn load_module(&self, name: &str, dir: &Path, entry: &str) -> PluginResult<Arc<dyn Plugin>> {
        if let Some(export) = entry.strip_prefix(BUILTIN_PREFIX) {
            let export = if export.is_empty() { name } else { export };
            return self.builtins.construct(name, export);
        }

        let path = dir.join(entry);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(PluginError::load(
                name,
                format!("entry '{}' not found", path.display()),
            ));
        }
        self.dynamic.load(name, &path).await
    }
}
