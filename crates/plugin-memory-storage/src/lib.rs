//! In-memory session storage plugin for Keystone.
//!
//! Keeps sessions in a process-local map and snapshots them to
//! `<data_dir>/sessions.json` on shutdown so a restart picks them up again.

pub mod hooks;
pub mod plugin;
pub mod store;

pub use plugin::MemoryStoragePlugin;

/// Builtin export name used in `main` (`builtin:memory-storage`).
pub const EXPORT_NAME: &str = "memory-storage";

#[cfg(feature = "export")]
keystone_plugin_sdk::export_plugin!("memory-storage", crate::MemoryStoragePlugin::new());
