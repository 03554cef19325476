//! `run`: drive a full lifecycle and report what happened.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use keystone_core::AppResult;
use keystone_core::config::AppConfig;
use keystone_plugin::{LoadOptions, PluginLoader};

use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Stop at the first plugin failure instead of skipping it
    #[arg(long)]
    pub strict: bool,

    /// Keep plugins running until Ctrl-C before shutting down
    #[arg(long)]
    pub wait: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct PluginRow {
    name: String,
    version: String,
    state: String,
    healthy: String,
    error: String,
}

pub async fn execute(args: &RunArgs, config: &AppConfig, format: OutputFormat) -> AppResult<()> {
    let loader = super::build_loader(config);
    let options = LoadOptions {
        skip_errors: !args.strict && config.plugins.skip_errors,
    };

    let report = match loader.load_all(options).await {
        Ok(report) => report,
        Err(e) => {
            // Strict mode: release whatever did start before reporting.
            loader.shutdown_all().await;
            return Err(e.into());
        }
    };

    print_plugins(&loader, format).await;
    if format == OutputFormat::Table {
        for failure in &report.failed {
            output::print_warning(&format!("{}: {}", failure.name, failure.error));
        }
        output::print_success(&format!(
            "{} plugin(s) active: {}",
            report.activated.len(),
            output::join_or_dash(&report.activated)
        ));
        print_providers(&loader).await;
    }

    if args.wait {
        output::print_kv("Waiting", "press Ctrl-C to shut down");
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Cannot listen for Ctrl-C; shutting down now");
        }
    }

    let shutdown = loader.shutdown_all().await;
    if format == OutputFormat::Table {
        for failure in &shutdown.failed {
            output::print_warning(&format!("shutdown {}: {}", failure.name, failure.error));
        }
        output::print_success(&format!(
            "Shut down in order: {}",
            output::join_or_dash(&shutdown.stopped)
        ));
    }
    Ok(())
}

async fn print_plugins(loader: &PluginLoader, format: OutputFormat) {
    let health = loader.health_check_all().await;
    let rows: Vec<PluginRow> = loader
        .registry()
        .list()
        .await
        .into_iter()
        .map(|summary| PluginRow {
            healthy: health
                .get(&summary.name)
                .map_or_else(|| "-".to_string(), |ok| ok.to_string()),
            name: summary.name,
            version: summary.version,
            state: summary.state.to_string(),
            error: summary.error.unwrap_or_default(),
        })
        .collect();
    output::print_list(&rows, format);
}

async fn print_providers(loader: &PluginLoader) {
    let storage = loader
        .storage_provider()
        .await
        .map(|p| p.metadata().name)
        .unwrap_or_else(|| "none".to_string());
    let llm = loader
        .llm_provider()
        .await
        .map(|p| p.metadata().name)
        .unwrap_or_else(|| "none".to_string());
    output::print_kv("Storage provider", storage);
    output::print_kv("LLM provider", llm);
}
