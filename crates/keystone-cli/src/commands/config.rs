//! `config`: inspect the effective configuration.

use clap::{Args, Subcommand};

use keystone_core::AppResult;
use keystone_core::config::AppConfig;

use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the merged configuration (files, overlay, environment)
    Show,
}

pub fn execute(args: &ConfigArgs, config: &AppConfig, format: OutputFormat) -> AppResult<()> {
    match args.command {
        ConfigCommand::Show => match format {
            OutputFormat::Json => output::print_json(config),
            OutputFormat::Table => show_table(config),
        },
    }
    Ok(())
}

fn show_table(config: &AppConfig) {
    let plugins = &config.plugins;
    println!("[plugins]");
    output::print_kv("directory", &plugins.directory);
    output::print_kv("data_directory", &plugins.data_directory);
    output::print_kv("manifest_file", &plugins.manifest_file);
    output::print_kv("auto_load", plugins.auto_load);
    output::print_kv("skip_errors", plugins.skip_errors);
    output::print_kv("enforce_permissions", plugins.enforce_permissions);
    output::print_kv(
        "lifecycle_timeout_seconds",
        plugins
            .lifecycle_timeout_seconds
            .map_or_else(|| "unbounded".to_string(), |s| s.to_string()),
    );
    let mut overridden: Vec<&String> = plugins.overrides.keys().collect();
    overridden.sort();
    for name in overridden {
        output::print_kv(&format!("overrides.{name}"), &plugins.overrides[name]);
    }

    println!("[logging]");
    output::print_kv("level", &config.logging.level);
    output::print_kv("format", &config.logging.format);
}
