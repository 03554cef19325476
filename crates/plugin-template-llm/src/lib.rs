//! Template-based encounter generator plugin for Keystone.
//!
//! Renders encounters from configured text templates instead of calling a
//! model. Useful for offline runs and as a reference LLM provider.

pub mod plugin;
pub mod template;

pub use plugin::TemplateLlmPlugin;
pub use template::EncounterTemplate;

/// Builtin export name used in `main` (`builtin:template-llm`).
pub const EXPORT_NAME: &str = "template-llm";

#[cfg(feature = "export")]
keystone_plugin_sdk::export_plugin!("template-llm", crate::TemplateLlmPlugin::new());
