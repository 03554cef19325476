//! FFI ABI definitions for dynamic plugins.
//!
//! A shared-library plugin exports:
//!
//! ```c
//! uint32_t keystone_plugin_abi_version(void);
//! PluginBox* keystone_plugin_create(void);            // default constructor
//! PluginBox* keystone_plugin_create_<name>(void);     // or a named one
//! const char* keystone_plugin_name(void);             // optional
//! ```
//!
//! Both sides must be built with the same compiler and `keystone-plugin`
//! version, since `PluginBox` carries a Rust trait object.

use std::os::raw::c_char;

use crate::traits::Plugin;

/// Bumped whenever the exported symbols or `Plugin` change incompatibly.
pub const PLUGIN_ABI_VERSION: u32 = 1;

/// Symbol returning the library's ABI version.
pub const ABI_VERSION_SYMBOL: &str = "keystone_plugin_abi_version";

/// Default constructor symbol.
pub const CREATE_SYMBOL: &str = "keystone_plugin_create";

/// Optional symbol returning the plugin's name as a C string.
pub const NAME_SYMBOL: &str = "keystone_plugin_name";

/// Heap cell handed across the boundary. A thin pointer to a fat `Box`.
pub struct PluginBox(pub Box<dyn Plugin>);

impl PluginBox {
    /// Boxes `plugin` and leaks it as a raw pointer for the host to reclaim.
    pub fn into_raw(plugin: Box<dyn Plugin>) -> *mut PluginBox {
        Box::into_raw(Box::new(PluginBox(plugin)))
    }
}

/// `keystone_plugin_create*` signature.
pub type PluginCreateFn = unsafe extern "C" fn() -> *mut PluginBox;

/// `keystone_plugin_abi_version` signature.
pub type PluginAbiVersionFn = unsafe extern "C" fn() -> u32;

/// `keystone_plugin_name` signature.
pub type PluginNameFn = unsafe extern "C" fn() -> *const c_char;

/// Named constructor symbol for `name`; non-alphanumerics become `_`.
pub fn named_create_symbol(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{CREATE_SYMBOL}_{sanitized}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_symbol_is_sanitized() {
        assert_eq!(
            named_create_symbol("memory-storage"),
            "keystone_plugin_create_memory_storage"
        );
        assert_eq!(named_create_symbol("a.b c"), "keystone_plugin_create_a_b_c");
    }
}
