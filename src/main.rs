//! Keystone host.
//!
//! Loads configuration, starts every discovered plugin in dependency order,
//! exposes the storage and LLM providers to the session service, and shuts
//! plugins down in reverse order on Ctrl-C or SIGTERM.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use keystone_core::AppResult;
use keystone_core::config::AppConfig;
use keystone_host::{SessionService, builtin_modules};
use keystone_plugin::{LoadOptions, PluginLoader};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Host error");
        std::process::exit(1);
    }
}

/// Layers `config/default.toml`, `config/<env>.toml` and `KEYSTONE__*`.
fn load_configuration() -> AppResult<AppConfig> {
    let env = std::env::var("KEYSTONE_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: AppConfig) -> AppResult<()> {
    tracing::info!("Starting Keystone v{}", env!("CARGO_PKG_VERSION"));

    let loader = Arc::new(PluginLoader::with_builtins(
        config.plugins.clone(),
        builtin_modules(),
    ));

    if config.plugins.auto_load {
        let report = loader
            .load_all(LoadOptions {
                skip_errors: config.plugins.skip_errors,
            })
            .await?;
        tracing::info!(
            activated = report.activated.len(),
            failed = report.failed.len(),
            cyclic = report.cyclic.len(),
            order = ?report.activated,
            "Plugins loaded"
        );
        for failure in &report.failed {
            tracing::warn!(plugin = %failure.name, error = %failure.error, "Plugin not started");
        }
    } else {
        tracing::info!("Plugin auto-load disabled");
    }

    let sessions = SessionService::new(Arc::clone(&loader));
    tracing::info!(
        storage = sessions.storage_ready().await,
        llm = sessions.llm_ready().await,
        "Keystone ready"
    );

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping plugins...");

    let report = loader.shutdown_all().await;
    for failure in &report.failed {
        tracing::warn!(plugin = %failure.name, error = %failure.error, "Plugin shutdown failed");
    }
    tracing::info!(stopped = ?report.stopped, "Keystone shut down");
    Ok(())
}

/// Waits for Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
