//! Checks hook and event names against a manifest's declared permissions.

use tracing::warn;

use crate::error::{PluginError, PluginResult};
use crate::manifest::PluginPermissions;

/// Enforces (or merely audits) the hook and event names a plugin declared.
///
/// An empty list means nothing was declared and every name is allowed.
#[derive(Debug, Clone, Default)]
pub struct PermissionGuard {
    plugin: String,
    hooks: Vec<String>,
    events: Vec<String>,
    enforce: bool,
}

impl PermissionGuard {
    /// Builds a guard from a manifest's permissions block.
    pub fn new(plugin: &str, permissions: &PluginPermissions, enforce: bool) -> Self {
        Self {
            plugin: plugin.to_string(),
            hooks: permissions.hooks.clone(),
            events: permissions.events.clone(),
            enforce,
        }
    }

    /// A guard that allows everything.
    pub fn permissive(plugin: &str) -> Self {
        Self {
            plugin: plugin.to_string(),
            ..Self::default()
        }
    }

    /// Checks use of hook `name`.
    pub fn check_hook(&self, name: &str) -> PluginResult<()> {
        self.check("hook", &self.hooks, name)
    }

    /// Checks use of event `name`.
    pub fn check_event(&self, name: &str) -> PluginResult<()> {
        self.check("event", &self.events, name)
    }

    fn check(&self, kind: &str, declared: &[String], name: &str) -> PluginResult<()> {
        if declared.is_empty() || declared.iter().any(|d| d == name) {
            return Ok(());
        }

        let capability = format!("{kind} '{name}'");
        if self.enforce {
            return Err(PluginError::PermissionDenied {
                name: self.plugin.clone(),
                capability,
            });
        }
        warn!(plugin = %self.plugin, capability = %capability, "Plugin used an undeclared {kind}");
        Ok(())
    }
}
