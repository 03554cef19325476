//! Prelude for convenient imports.

pub use async_trait::async_trait;

pub use keystone_core::{AppError, AppResult};

pub use crate::api::context::PluginContext;
pub use crate::api::logger::PluginLogger;
pub use crate::events::definitions::{SESSION_COMPLETED, SESSION_STARTED};
pub use crate::events::{Event, EventHandler};
pub use crate::hooks::{HookHandler, StandardHook};
pub use crate::subscription::SubscriptionId;
pub use crate::traits::{Plugin, PluginMetadata};

pub use crate::declare_plugin;
