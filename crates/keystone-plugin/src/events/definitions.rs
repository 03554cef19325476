//! Well-known event names.

/// Emitted when a plugin is added to the registry.
pub const PLUGIN_REGISTERED: &str = "plugin:registered";
/// Emitted when a plugin enters `LOADING`.
pub const PLUGIN_LOADING: &str = "plugin:loading";
/// Emitted when a plugin instance has been constructed.
pub const PLUGIN_LOADED: &str = "plugin:loaded";
/// Emitted when `initialize` is about to run.
pub const PLUGIN_INITIALIZING: &str = "plugin:initializing";
/// Emitted when a plugin becomes `ACTIVE`.
pub const PLUGIN_ACTIVATED: &str = "plugin:activated";
/// Emitted when a plugin starts shutting down.
pub const PLUGIN_DEACTIVATING: &str = "plugin:deactivating";
/// Emitted when a plugin reaches `SHUT_DOWN`.
pub const PLUGIN_SHUTDOWN: &str = "plugin:shutdown";
/// Emitted when a plugin enters `ERROR`.
pub const PLUGIN_ERROR: &str = "plugin:error";
/// Emitted when a plugin is removed from the registry.
pub const PLUGIN_UNREGISTERED: &str = "plugin:unregistered";

/// Emitted by the host when a session starts.
pub const SESSION_STARTED: &str = "session:started";
/// Emitted by the host when a session completes.
pub const SESSION_COMPLETED: &str = "session:completed";
