//! Per-plugin logger.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

/// Logger whose every line carries the owning plugin's name, both as the
/// `plugin` field and as a `[name]` message prefix.
#[derive(Debug, Clone)]
pub struct PluginLogger {
    plugin: Arc<str>,
}

impl PluginLogger {
    /// Creates a logger for `plugin`.
    pub fn new(plugin: &str) -> Self {
        Self {
            plugin: Arc::from(plugin),
        }
    }

    /// The owning plugin.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        debug!(plugin = %self.plugin, "[{}] {}", self.plugin, message.as_ref());
    }

    pub fn info(&self, message: impl AsRef<str>) {
        info!(plugin = %self.plugin, "[{}] {}", self.plugin, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        warn!(plugin = %self.plugin, "[{}] {}", self.plugin, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        error!(plugin = %self.plugin, "[{}] {}", self.plugin, message.as_ref());
    }
}
