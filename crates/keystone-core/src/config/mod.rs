//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section, and every field carries a serde default so an empty
//! configuration is valid.

pub mod logging;
pub mod plugin;

use serde::{Deserialize, Serialize};

pub use self::logging::LoggingConfig;
pub use self::plugin::PluginConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Plugin runtime settings.
    #[serde(default)]
    pub plugins: PluginConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `KEYSTONE`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        Self::load_from("config", env)
    }

    /// Load configuration from a specific configuration directory.
    pub fn load_from(dir: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{dir}/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("KEYSTONE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_files_yield_defaults() {
        let dir = std::env::temp_dir().join("keystone-config-absent");
        let config = AppConfig::load_from(dir.to_str().unwrap(), "test").unwrap();
        assert_eq!(config.plugins.manifest_file, "plugin.json");
        assert_eq!(config.logging.level, "info");
        assert!(config.plugins.lifecycle_timeout_seconds.is_none());
    }

    #[test]
    fn test_deserialize_overrides() {
        let raw = serde_json::json!({
            "plugins": {
                "directory": "/srv/plugins",
                "skip_errors": false,
                "overrides": { "memory-storage": { "flush": true } }
            }
        });
        let config: AppConfig = serde_json::from_value(raw).unwrap();
        assert_eq!(config.plugins.directory, "/srv/plugins");
        assert!(!config.plugins.skip_errors);
        assert_eq!(config.plugins.data_directory, "./data/plugins");
        assert_eq!(
            config.plugins.overrides["memory-storage"]["flush"],
            serde_json::json!(true)
        );
    }
}
