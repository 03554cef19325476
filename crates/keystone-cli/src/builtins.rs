//! Plugins compiled into the CLI and reachable through `builtin:` entries.

use std::sync::Arc;

use keystone_plugin::BuiltinModules;
use plugin_memory_storage::MemoryStoragePlugin;
use plugin_template_llm::TemplateLlmPlugin;

pub fn modules() -> BuiltinModules {
    BuiltinModules::new()
        .with(plugin_memory_storage::EXPORT_NAME, || {
            Arc::new(MemoryStoragePlugin::new())
        })
        .with(plugin_template_llm::EXPORT_NAME, || {
            Arc::new(TemplateLlmPlugin::new())
        })
}
