//! # keystone-plugin-sdk
//!
//! SDK for developing Keystone plugins.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use keystone_plugin_sdk::prelude::*;
//!
//! #[derive(Debug, Default)]
//! struct Greeter {
//!     context: ContextCell,
//! }
//!
//! #[async_trait]
//! impl Plugin for Greeter {
//!     fn metadata(&self) -> PluginMetadata {
//!         PluginMetadata::new("greeter", "1.0.0")
//!     }
//!
//!     async fn initialize(&self, context: PluginContext) -> AppResult<()> {
//!         context.logger().info("hello");
//!         self.context.set(context)
//!     }
//! }
//!
//! export_plugin!("greeter", Greeter::default());
//! ```

pub mod cell;

pub use keystone_plugin::declare_plugin as export_plugin;

/// Prelude for convenient imports.
pub mod prelude {
    pub use keystone_plugin::prelude::*;

    pub use keystone_plugin::ProviderKind;
    pub use keystone_plugin::api::{PluginEvents, PluginHooks};

    pub use crate::cell::ContextCell;
    pub use crate::export_plugin;
}
