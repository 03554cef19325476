//! Dynamic plugin loader using `libloading` (feature-gated).

#[cfg(feature = "dynamic")]
mod imp {
    use std::path::Path;
    use std::sync::{Arc, Mutex, PoisonError};

    use tracing::{info, warn};

    use crate::error::{PluginError, PluginResult};
    use crate::ffi::abi::{
        ABI_VERSION_SYMBOL, CREATE_SYMBOL, NAME_SYMBOL, PLUGIN_ABI_VERSION, PluginAbiVersionFn,
        PluginCreateFn, PluginNameFn, named_create_symbol,
    };
    use crate::ffi::safety::c_str_to_string;
    use crate::traits::Plugin;

    /// Loads plugins from shared libraries (.so / .dll / .dylib).
    ///
    /// Libraries stay mapped for the life of the process, since instances
    /// they created may outlive the loader.
    #[derive(Default)]
    pub struct DynamicModules {
        libraries: Mutex<Vec<libloading::Library>>,
    }

    impl DynamicModules {
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of libraries opened so far.
        pub fn loaded_count(&self) -> usize {
            self.libraries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        }

        /// Opens `path` and constructs plugin `name` from it.
        pub async fn load(&self, name: &str, path: &Path) -> PluginResult<Arc<dyn Plugin>> {
            let owned_name = name.to_string();
            let owned_path = path.to_path_buf();

            let (library, plugin) =
                tokio::task::spawn_blocking(move || open(&owned_name, &owned_path))
                    .await
                    .map_err(|e| PluginError::load(name, format!("loader task failed: {e}")))??;

            self.libraries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(library);

            info!(plugin = %name, path = %path.display(), "Dynamic plugin loaded");
            Ok(plugin)
        }
    }

    /// Opens the library and calls its constructor.
    ///
    /// Only trusted plugins should be loaded: the library runs arbitrary
    /// code in-process.
    fn open(name: &str, path: &Path) -> PluginResult<(libloading::Library, Arc<dyn Plugin>)> {
        let fail = |reason: String| PluginError::load(name, reason);

        // SAFETY: loading runs the library's initializers; plugins are trusted.
        let library = unsafe { libloading::Library::new(path) }
            .map_err(|e| fail(format!("cannot open '{}': {e}", path.display())))?;

        let abi = {
            // SAFETY: the symbol type matches the documented ABI.
            let symbol = unsafe { library.get::<PluginAbiVersionFn>(ABI_VERSION_SYMBOL.as_bytes()) }
                .map_err(|e| fail(format!("missing '{ABI_VERSION_SYMBOL}' export: {e}")))?;
            unsafe { symbol() }
        };
        if abi != PLUGIN_ABI_VERSION {
            return Err(fail(format!(
                "ABI version {abi} does not match host version {PLUGIN_ABI_VERSION}"
            )));
        }

        // SAFETY: optional symbol with the documented signature.
        if let Ok(symbol) = unsafe { library.get::<PluginNameFn>(NAME_SYMBOL.as_bytes()) } {
            let exported = unsafe { c_str_to_string(symbol()) };
            if exported.as_deref() != Some(name) {
                warn!(
                    plugin = %name,
                    exported = exported.as_deref().unwrap_or("<null>"),
                    "Library reports a different plugin name"
                );
            }
        }

        let named = named_create_symbol(name);
        let create: PluginCreateFn = {
            // SAFETY: constructor symbols share one documented signature.
            let default = unsafe { library.get::<PluginCreateFn>(CREATE_SYMBOL.as_bytes()) };
            match default {
                Ok(symbol) => *symbol,
                Err(_) => *unsafe { library.get::<PluginCreateFn>(named.as_bytes()) }.map_err(|_| {
                    fail(format!("missing export: neither '{CREATE_SYMBOL}' nor '{named}' found"))
                })?,
            }
        };

        // SAFETY: `create` was resolved from a library that is still loaded.
        let raw = unsafe { create() };
        if raw.is_null() {
            return Err(fail("constructor returned null".to_string()));
        }
        // SAFETY: `raw` came from `PluginBox::into_raw` in the plugin library.
        let boxed = unsafe { Box::from_raw(raw) };
        let plugin: Arc<dyn Plugin> = Arc::from(boxed.0);

        Ok((library, plugin))
    }

    impl Drop for DynamicModules {
        fn drop(&mut self) {
            let libraries = self
                .libraries
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner);
            for library in libraries.drain(..) {
                std::mem::forget(library);
            }
        }
    }

    impl std::fmt::Debug for DynamicModules {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("DynamicModules")
                .field("loaded_count", &self.loaded_count())
                .finish()
        }
    }
}

/// Stub loader when the `dynamic` feature is not enabled.
#[cfg(not(feature = "dynamic"))]
mod imp {
    use std::path::Path;
    use std::sync::Arc;

    use crate::error::{PluginError, PluginResult};
    use crate::traits::Plugin;

    /// Stub dynamic loader.
    #[derive(Debug, Default)]
    pub struct DynamicModules;

    impl DynamicModules {
        pub fn new() -> Self {
            Self
        }

        pub fn loaded_count(&self) -> usize {
            0
        }

        /// Always fails: shared libraries need the `dynamic` feature.
        pub async fn load(&self, name: &str, path: &Path) -> PluginResult<Arc<dyn Plugin>> {
            Err(PluginError::load(
                name,
                format!(
                    "cannot load '{}': dynamic loading is disabled (enable the `dynamic` feature)",
                    path.display()
                ),
            ))
        }
    }
}

pub use imp::DynamicModules;
