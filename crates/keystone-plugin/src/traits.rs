//! The plugin contract every extension module implements.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use keystone_core::AppResult;
use keystone_core::traits::{LlmProvider, StorageProvider};

use crate::api::context::PluginContext;

/// Metadata a plugin reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Plugin name. Expected to match the manifest name.
    pub name: String,
    /// Plugin version string.
    pub version: String,
    /// Plugin description.
    #[serde(default)]
    pub description: String,
    /// Author or maintainer.
    #[serde(default)]
    pub author: Option<String>,
}

impl PluginMetadata {
    /// Creates metadata with an empty description and no author.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            author: None,
        }
    }

    /// Builder: sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Provider interfaces a plugin may expose to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Session persistence.
    Storage,
    /// Encounter generation.
    Llm,
}

/// Trait that all plugins must implement.
///
/// The runtime drives the methods in order: `initialize` → `activate` →
/// `deactivate` → `shutdown`. Methods take `&self` because the registry
/// shares the instance; plugins keep mutable state behind their own locks.
#[async_trait]
pub trait Plugin: Send + Sync + std::fmt::Debug {
    /// Returns plugin metadata. Must be callable at any time.
    fn metadata(&self) -> PluginMetadata;

    /// Called once with the plugin's context before activation.
    async fn initialize(&self, context: PluginContext) -> AppResult<()>;

    /// Called after a successful `initialize`.
    async fn activate(&self) -> AppResult<()> {
        Ok(())
    }

    /// Called before `shutdown`; hooks and listeners are removed afterwards.
    async fn deactivate(&self) -> AppResult<()> {
        Ok(())
    }

    /// Releases every resource held by the plugin.
    async fn shutdown(&self) -> AppResult<()> {
        Ok(())
    }

    /// Reports whether the plugin is healthy.
    async fn health_check(&self) -> bool {
        true
    }

    /// Exposes the plugin as a storage provider, if it is one.
    fn as_storage_provider(&self) -> Option<&dyn StorageProvider> {
        None
    }

    /// Exposes the plugin as an LLM provider, if it is one.
    fn as_llm_provider(&self) -> Option<&dyn LlmProvider> {
        None
    }

    /// Returns whether the plugin exposes the given provider interface.
    fn provides(&self, kind: ProviderKind) -> bool {
        match kind {
            ProviderKind::Storage => self.as_storage_provider().is_some(),
            ProviderKind::Llm => self.as_llm_provider().is_some(),
        }
    }
}
