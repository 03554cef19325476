//! Plugin runtime configuration.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Plugin runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Directory scanned for plugin subdirectories.
    #[serde(default = "default_plugin_directory")]
    pub directory: String,
    /// Parent directory of every plugin's private data directory.
    #[serde(default = "default_data_directory")]
    pub data_directory: String,
    /// Manifest file name looked up inside each plugin directory.
    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,
    /// Whether to automatically load plugins on startup.
    #[serde(default = "default_true")]
    pub auto_load: bool,
    /// Whether a failing plugin is skipped instead of aborting startup.
    #[serde(default = "default_true")]
    pub skip_errors: bool,
    /// Reject hook/event names a plugin did not declare in its manifest.
    #[serde(default)]
    pub enforce_permissions: bool,
    /// Upper bound for a single lifecycle call. Unset means no bound.
    #[serde(default)]
    pub lifecycle_timeout_seconds: Option<u64>,
    /// Plugin name → configuration merged over the manifest defaults.
    #[serde(default)]
    pub overrides: HashMap<String, serde_json::Value>,
}

impl PluginConfig {
    /// Returns the lifecycle timeout as a `Duration`, if configured.
    pub fn lifecycle_timeout(&self) -> Option<Duration> {
        self.lifecycle_timeout_seconds.map(Duration::from_secs)
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            directory: default_plugin_directory(),
            data_directory: default_data_directory(),
            manifest_file: default_manifest_file(),
            auto_load: true,
            skip_errors: true,
            enforce_permissions: false,
            lifecycle_timeout_seconds: None,
            overrides: HashMap::new(),
        }
    }
}

fn default_plugin_directory() -> String {
    "./plugins".to_string()
}

fn default_data_directory() -> String {
    "./data/plugins".to_string()
}

fn default_manifest_file() -> String {
    "plugin.json".to_string()
}

fn default_true() -> bool {
    true
}
