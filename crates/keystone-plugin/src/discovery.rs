//! Scans a root directory for plugin subdirectories.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::manifest::PluginManifest;

/// A plugin found on disk, before registration.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredPlugin {
    /// Manifest name.
    pub name: String,
    /// Plugin directory.
    pub path: PathBuf,
    /// Parsed manifest.
    pub manifest: PluginManifest,
}

impl DiscoveredPlugin {
    /// Wraps a manifest located in `path`.
    pub fn new(path: impl Into<PathBuf>, manifest: PluginManifest) -> Self {
        Self {
            name: manifest.name.clone(),
            path: path.into(),
            manifest,
        }
    }
}

/// Scans the immediate subdirectories of `root` for `manifest_file`.
///
/// Directories are visited in name order. Hidden directories and directories
/// without a manifest are ignored; invalid manifests and duplicate names are
/// logged and skipped. A missing root yields an empty list.
pub async fn scan(root: &Path, manifest_file: &str) -> Vec<DiscoveredPlugin> {
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!(root = %root.display(), error = %e, "Plugin directory not readable");
            return Vec::new();
        }
    };

    let mut dirs = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let hidden = entry.file_name().to_string_lossy().starts_with('.');
                let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                if is_dir && !hidden {
                    dirs.push(entry.path());
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Failed to read plugin directory entry");
                break;
            }
        }
    }
    dirs.sort();

    let mut found: Vec<DiscoveredPlugin> = Vec::new();
    for dir in dirs {
        let manifest_path = dir.join(manifest_file);
        if !tokio::fs::try_exists(&manifest_path).await.unwrap_or(false) {
            debug!(dir = %dir.display(), "No manifest, skipping directory");
            continue;
        }

        match PluginManifest::load(&manifest_path).await {
            Ok(manifest) => {
                if found.iter().any(|p| p.name == manifest.name) {
                    warn!(
                        plugin = %manifest.name,
                        dir = %dir.display(),
                        "Duplicate plugin name, skipping"
                    );
                    continue;
                }
                debug!(plugin = %manifest.name, dir = %dir.display(), "Discovered plugin");
                found.push(DiscoveredPlugin::new(dir, manifest));
            }
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Skipping plugin with invalid manifest");
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        let plugin_dir = dir.join(name);
        std::fs::create_dir_all(&plugin_dir).unwrap();
        std::fs::write(plugin_dir.join("plugin.json"), body).unwrap();
    }

    #[tokio::test]
    async fn test_scan_skips_invalid_and_hidden() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "b", r#"{"name":"b","version":"1.0.0","main":"builtin:b"}"#);
        write(tmp.path(), "a", r#"{"name":"a","version":"1.0.0","main":"builtin:a"}"#);
        write(tmp.path(), "broken", "{ nope");
        write(tmp.path(), "nomain", r#"{"name":"x","version":"1.0.0"}"#);
        write(tmp.path(), ".hidden", r#"{"name":"h","version":"1.0.0","main":"h"}"#);
        std::fs::create_dir_all(tmp.path().join("empty")).unwrap();
        std::fs::write(tmp.path().join("stray.json"), "{}").unwrap();

        let found = scan(tmp.path(), "plugin.json").await;
        let names: Vec<_> = found.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(found[0].path, tmp.path().join("a"));
    }

    #[tokio::test]
    async fn test_scan_skips_duplicate_names() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "one", r#"{"name":"same","version":"1.0.0","main":"builtin:"}"#);
        write(tmp.path(), "two", r#"{"name":"same","version":"2.0.0","main":"builtin:"}"#);

        let found = scan(tmp.path(), "plugin.json").await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].manifest.version, "1.0.0");
    }

    #[tokio::test]
    async fn test_missing_root_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(scan(&tmp.path().join("absent"), "plugin.json").await.is_empty());
    }
}
