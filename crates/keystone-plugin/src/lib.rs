//! # keystone-plugin
//!
//! Plugin runtime for Keystone. Provides:
//!
//! - Manifest parsing and directory discovery
//! - Dependency ordering with cycle detection
//! - Lifecycle management (load, initialize, activate, deactivate, shutdown)
//! - A priority-ordered hook pipeline and a publish/subscribe event bus
//! - Per-plugin contexts with scoped logging, hooks, events, and storage
//! - Builtin and shared-library module loading (`dynamic` feature)

pub mod api;
pub mod discovery;
pub mod error;
pub mod events;
pub mod ffi;
pub mod graph;
pub mod hooks;
pub mod loader;
pub mod macros;
pub mod manifest;
pub mod module;
pub mod prelude;
pub mod registry;
pub mod state;
pub mod subscription;
pub mod traits;

pub use api::context::PluginContext;
pub use discovery::DiscoveredPlugin;
pub use error::{LifecyclePhase, PluginError, PluginResult};
pub use events::{Event, EventBus};
pub use graph::{LoadOrder, resolve_load_order};
pub use hooks::{HookOptions, HookPipeline, StandardHook};
pub use loader::{LoadOptions, LoadReport, PluginLoader, ShutdownReport};
pub use manifest::{PluginDependency, PluginManifest, PluginPermissions};
pub use module::{BuiltinModules, ModuleLoader, ModuleResolver};
pub use registry::{PluginRegistry, RegistryEntry};
pub use state::PluginState;
pub use subscription::SubscriptionId;
pub use traits::{Plugin, PluginMetadata, ProviderKind};
