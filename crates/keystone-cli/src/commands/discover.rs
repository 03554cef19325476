//! `discover`: list plugin manifests without loading anything.

use serde::Serialize;
use tabled::Tabled;

use keystone_core::AppResult;
use keystone_core::config::AppConfig;

use crate::output::{self, OutputFormat};

#[derive(Debug, Serialize, Tabled)]
struct ManifestRow {
    name: String,
    version: String,
    main: String,
    requires: String,
    optional: String,
    path: String,
}

pub async fn execute(config: &AppConfig, format: OutputFormat) -> AppResult<()> {
    let loader = super::build_loader(config);
    let discovered = loader.discover().await;

    let rows: Vec<ManifestRow> = discovered
        .iter()
        .map(|plugin| {
            let (optional, required): (Vec<_>, Vec<_>) = plugin
                .manifest
                .dependencies
                .iter()
                .partition(|dep| dep.optional);
            let describe = |deps: Vec<&keystone_plugin::PluginDependency>| {
                let names: Vec<String> = deps
                    .iter()
                    .map(|dep| format!("{} {}", dep.name, dep.version))
                    .collect();
                output::join_or_dash(&names)
            };

            ManifestRow {
                name: plugin.name.clone(),
                version: plugin.manifest.version.clone(),
                main: plugin.manifest.main.clone(),
                requires: describe(required),
                optional: describe(optional),
                path: plugin.path.display().to_string(),
            }
        })
        .collect();

    output::print_list(&rows, format);
    if format == OutputFormat::Table {
        output::print_kv("Plugin directory", &config.plugins.directory);
    }
    Ok(())
}
