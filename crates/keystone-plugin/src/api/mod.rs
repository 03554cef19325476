//! Plugin API: the context and scoped facades handed to plugin code.

pub mod context;
pub mod logger;
pub mod permissions;
pub mod scoped;

pub use context::PluginContext;
pub use logger::PluginLogger;
pub use permissions::PermissionGuard;
pub use scoped::{PluginEvents, PluginHooks};
