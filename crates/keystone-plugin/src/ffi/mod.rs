//! C-ABI surface shared by the host and shared-library plugins.

pub mod abi;
pub mod safety;

pub use abi::{PLUGIN_ABI_VERSION, PluginBox, named_create_symbol};
