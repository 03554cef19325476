//! CLI command definitions and dispatch.

pub mod config;
pub mod discover;
pub mod order;
pub mod run;

use clap::{Parser, Subcommand};

use keystone_core::AppResult;
use keystone_core::config::AppConfig;
use keystone_plugin::PluginLoader;

use crate::output::OutputFormat;

/// Keystone plugin runtime tools
#[derive(Debug, Parser)]
#[command(name = "keystone", version, about, long_about = None)]
pub struct Cli {
    /// Directory holding `default.toml` and environment overlays
    #[arg(long, default_value = "config")]
    pub config_dir: String,

    /// Environment overlay to apply (`<config-dir>/<env>.toml`)
    #[arg(short, long, default_value = "development")]
    pub env: String,

    /// Override the plugin directory from the configuration
    #[arg(short, long)]
    pub plugins: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List plugins found in the plugin directory
    Discover,
    /// Show the dependency-resolved load order
    Order,
    /// Load, activate, and shut down every plugin
    Run(run::RunArgs),
    /// Configuration inspection
    Config(config::ConfigArgs),
}

impl Cli {
    pub async fn execute(&self) -> AppResult<()> {
        let config = self.load_config()?;
        match &self.command {
            Commands::Discover => discover::execute(&config, self.format).await,
            Commands::Order => order::execute(&config, self.format).await,
            Commands::Run(args) => run::execute(args, &config, self.format).await,
            Commands::Config(args) => config::execute(args, &config, self.format),
        }
    }

    fn load_config(&self) -> AppResult<AppConfig> {
        let mut config = AppConfig::load_from(&self.config_dir, &self.env)?;
        if let Some(dir) = &self.plugins {
            config.plugins.directory = dir.clone();
        }
        Ok(config)
    }
}

/// Loader over the configured directory with the bundled builtins.
pub fn build_loader(config: &AppConfig) -> PluginLoader {
    PluginLoader::with_builtins(config.plugins.clone(), crate::builtins::modules())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "keystone",
            "--plugins",
            "/srv/plugins",
            "-f",
            "json",
            "run",
            "--strict",
        ])
        .unwrap();
        assert_eq!(cli.plugins.as_deref(), Some("/srv/plugins"));
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Run(args) => {
                assert!(args.strict);
                assert!(!args.wait);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_plugin_directory_override() {
        let tmp = std::env::temp_dir().join("keystone-cli-no-config");
        let cli = Cli::try_parse_from([
            "keystone",
            "--config-dir",
            tmp.to_str().unwrap(),
            "-p",
            "/opt/plugins",
            "order",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.plugins.directory, "/opt/plugins");
        assert_eq!(config.plugins.manifest_file, "plugin.json");
    }
}
