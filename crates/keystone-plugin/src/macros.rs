//! Convenience macros for plugin development.

/// Emits the C-ABI entry points a shared-library plugin must export.
///
/// The first form exports the default constructor `keystone_plugin_create`.
/// The second exports a named constructor instead, which must be spelled
/// `keystone_plugin_create_<name>` with non-alphanumerics replaced by `_`.
///
/// # Example
/// ```rust,ignore
/// keystone_plugin::declare_plugin!("memory-storage", MemoryStoragePlugin::new());
///
/// keystone_plugin::declare_plugin!(
///     "memory-storage",
///     keystone_plugin_create_memory_storage => MemoryStoragePlugin::new()
/// );
/// ```
#[macro_export]
macro_rules! declare_plugin {
    (@common $name:literal) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn keystone_plugin_abi_version() -> u32 {
            $crate::ffi::abi::PLUGIN_ABI_VERSION
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn keystone_plugin_name() -> *const ::std::os::raw::c_char {
            concat!($name, "\0").as_ptr().cast()
        }
    };
    (@construct $ctor:expr) => {
        // A panic must not unwind into the host; report it as a null instance.
        match ::std::panic::catch_unwind(
            || -> ::std::boxed::Box<dyn $crate::traits::Plugin> { ::std::boxed::Box::new($ctor) },
        ) {
            Ok(plugin) => $crate::ffi::abi::PluginBox::into_raw(plugin),
            Err(_) => ::std::ptr::null_mut(),
        }
    };
    ($name:literal, $symbol:ident => $ctor:expr) => {
        $crate::declare_plugin!(@common $name);

        #[unsafe(no_mangle)]
        #[allow(improper_ctypes_definitions)]
        pub extern "C" fn $symbol() -> *mut $crate::ffi::abi::PluginBox {
            $crate::declare_plugin!(@construct $ctor)
        }
    };
    ($name:literal, $ctor:expr) => {
        $crate::declare_plugin!(@common $name);

        #[unsafe(no_mangle)]
        #[allow(improper_ctypes_definitions)]
        pub extern "C" fn keystone_plugin_create() -> *mut $crate::ffi::abi::PluginBox {
            $crate::declare_plugin!(@construct $ctor)
        }
    };
}
