//! # keystone-host
//!
//! Host-side wiring for the plugin runtime: the builtin plugin table and the
//! session service that routes session operations through provider plugins.

use std::sync::Arc;

use keystone_plugin::BuiltinModules;

pub mod sessions;

pub use sessions::SessionService;

/// Plugins linked into the host, addressed as `builtin:<name>` in manifests.
pub fn builtin_modules() -> BuiltinModules {
    BuiltinModules::new()
        .with(plugin_memory_storage::EXPORT_NAME, || {
            Arc::new(plugin_memory_storage::MemoryStoragePlugin::new())
        })
        .with(plugin_template_llm::EXPORT_NAME, || {
            Arc::new(plugin_template_llm::TemplateLlmPlugin::new())
        })
}
