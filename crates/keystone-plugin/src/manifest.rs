//! Plugin manifest, the declarative descriptor stored in each plugin directory.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PluginError, PluginResult};

/// Default manifest file name inside a plugin directory.
pub const DEFAULT_MANIFEST_FILE: &str = "plugin.json";

/// Capabilities a plugin requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginPermissions {
    /// Persistent storage access.
    pub storage: bool,
    /// Outbound network access.
    pub network: bool,
    /// Filesystem access outside the data directory.
    pub filesystem: bool,
    /// Environment variable access.
    pub env: bool,
    /// Hook names the plugin may register for.
    pub hooks: Vec<String>,
    /// Event names the plugin may subscribe to or emit.
    pub events: Vec<String>,
}

/// A dependency on another plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDependency {
    /// Name of the required plugin.
    pub name: String,
    /// Semantic version range, e.g. `^1.2`.
    #[serde(default = "default_version_range", alias = "versionRange")]
    pub version: String,
    /// Optional dependencies never block initialization.
    #[serde(default)]
    pub optional: bool,
}

impl PluginDependency {
    /// Creates a required dependency accepting any version.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version_range(),
            optional: false,
        }
    }

    /// Creates an optional dependency accepting any version.
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            optional: true,
            ..Self::required(name)
        }
    }

    /// Returns whether `version` satisfies this dependency's range.
    ///
    /// Unparseable ranges or versions are treated as satisfied; the range is
    /// advisory and never blocks loading.
    pub fn accepts(&self, version: &str) -> bool {
        let Ok(req) = semver::VersionReq::parse(&self.version) else {
            return true;
        };
        match semver::Version::parse(version) {
            Ok(v) => req.matches(&v),
            Err(_) => true,
        }
    }
}

/// Plugin manifest loaded from `plugin.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Unique plugin name.
    pub name: String,
    /// Semantic version string.
    pub version: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Entry artifact, relative to the plugin directory, or `builtin:<export>`.
    pub main: String,
    /// Author or maintainer.
    #[serde(default)]
    pub author: Option<String>,
    /// Default configuration handed to the plugin.
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Requested capabilities.
    #[serde(default)]
    pub permissions: PluginPermissions,
    /// Other plugins this one depends on.
    #[serde(default)]
    pub dependencies: Vec<PluginDependency>,
}

impl PluginManifest {
    /// Creates a minimal manifest.
    pub fn new(name: impl Into<String>, version: impl Into<String>, main: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            main: main.into(),
            author: None,
            config: Map::new(),
            permissions: PluginPermissions::default(),
            dependencies: Vec::new(),
        }
    }

    /// Builder: adds a dependency.
    pub fn with_dependency(mut self, dependency: PluginDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Builder: sets a default configuration value.
    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// Builder: sets the permissions block.
    pub fn with_permissions(mut self, permissions: PluginPermissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Names of the dependencies that must be present.
    pub fn required_dependencies(&self) -> impl Iterator<Item = &PluginDependency> {
        self.dependencies.iter().filter(|d| !d.optional)
    }

    /// Parses and validates a manifest from JSON text.
    pub fn from_json(path: &Path, raw: &str) -> PluginResult<Self> {
        let manifest: PluginManifest =
            serde_json::from_str(raw).map_err(|e| PluginError::Manifest {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        manifest.validate(path)?;
        Ok(manifest)
    }

    /// Reads, parses, and validates a manifest file.
    pub async fn load(path: &Path) -> PluginResult<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PluginError::Manifest {
                path: path.to_path_buf(),
                reason: format!("unreadable: {e}"),
            })?;
        Self::from_json(path, &raw)
    }

    /// Checks that the required fields are present and non-empty.
    pub fn validate(&self, path: &Path) -> PluginResult<()> {
        let missing: Vec<&str> = [
            ("name", &self.name),
            ("version", &self.version),
            ("main", &self.main),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect();

        if !missing.is_empty() {
            return Err(PluginError::Manifest {
                path: path.to_path_buf(),
                reason: format!("missing required field(s): {}", missing.join(", ")),
            });
        }

        if semver::Version::parse(&self.version).is_err() {
            tracing::warn!(
                plugin = %self.name,
                version = %self.version,
                "Manifest version is not a valid semantic version"
            );
        }

        Ok(())
    }
}

fn default_version_range() -> String {
    "*".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> &'static Path {
        Path::new("plugins/test/plugin.json")
    }

    #[test]
    fn test_parse_full_manifest() {
        let raw = r#"{
            "name": "memory-storage",
            "version": "1.2.0",
            "description": "Sessions in memory",
            "main": "lib/libmemory_storage.so",
            "config": { "flushOnShutdown": true },
            "permissions": { "storage": true, "hooks": ["after-complete-session"], "events": ["session:completed"] },
            "dependencies": [
                { "name": "core-utils", "versionRange": "^1.0" },
                { "name": "metrics", "version": "*", "optional": true }
            ]
        }"#;
        let manifest = PluginManifest::from_json(path(), raw).unwrap();
        assert_eq!(manifest.name, "memory-storage");
        assert_eq!(manifest.config["flushOnShutdown"], Value::Bool(true));
        assert!(manifest.permissions.storage);
        assert!(!manifest.permissions.network);
        assert_eq!(manifest.permissions.hooks, vec!["after-complete-session"]);
        assert_eq!(manifest.dependencies[0].version, "^1.0");
        assert!(!manifest.dependencies[0].optional);
        assert!(manifest.dependencies[1].optional);
        assert_eq!(manifest.required_dependencies().count(), 1);
    }

    #[test]
    fn test_missing_main_rejected() {
        let raw = r#"{ "name": "x", "version": "1.0.0" }"#;
        let err = PluginManifest::from_json(path(), raw).unwrap_err();
        assert!(matches!(err, PluginError::Manifest { .. }));
    }

    #[test]
    fn test_empty_required_field_rejected() {
        let raw = r#"{ "name": "", "version": "1.0.0", "main": "x.so" }"#;
        let err = PluginManifest::from_json(path(), raw).unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = PluginManifest::from_json(path(), "{ not json").unwrap_err();
        assert!(matches!(err, PluginError::Manifest { .. }));
    }

    #[test]
    fn test_version_range_acceptance() {
        let dep = PluginDependency {
            name: "b".into(),
            version: "^1.2".into(),
            optional: false,
        };
        assert!(dep.accepts("1.4.0"));
        assert!(!dep.accepts("2.0.0"));
        assert!(dep.accepts("not-a-version"));
        assert!(PluginDependency::required("b").accepts("0.0.1"));
    }
}
