use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use burrow::{ConfigManager, StatusRegistry, TunnelEngine};
use burrow_config::validation::validate_all;
use burrow_config::{
    complete_proxies, complete_visitors, filter_client_configs, load_client_config,
    set_disallow_unknown_fields, DecodeOptions,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Grace period for in-flight work on shutdown
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// Burrow - tunnel client with runtime-editable proxies
#[derive(Parser, Debug)]
#[command(name = "burrow")]
#[command(about = "Run tunnel proxies and visitors from a config file and a local store")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (TOML, or JSON with a .json extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reject unknown fields in config documents
    #[arg(long)]
    strict: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the config and keep the engine in sync with it (default)
    Run,

    /// Load and validate the config, then exit
    Verify,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("burrow=info".parse()?)
                .add_directive("burrow_config=info".parse()?)
                .add_directive("burrow_source=info".parse()?),
        )
        .init();

    set_disallow_unknown_fields(cli.strict);

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    match cli.command {
        Some(Commands::Verify) => run_verify(config_path, cli.strict),
        Some(Commands::Run) | None => run(config_path, cli.strict).await,
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("burrow").join("burrow.toml"))
        .unwrap_or_else(|| PathBuf::from("burrow.toml"))
}

fn run_verify(config_path: PathBuf, strict: bool) -> Result<()> {
    let result = load_client_config(&config_path, DecodeOptions::with_strict(strict))
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let mut common = result.common;
    common.complete();
    let (proxies, visitors) = filter_client_configs(&common, result.proxies, result.visitors);
    let proxies = complete_proxies(&proxies);
    let visitors = complete_visitors(&visitors);
    validate_all(&common, &proxies, &visitors).context("Invalid config")?;

    println!(
        "{}: syntax is ok ({} proxies, {} visitors)",
        config_path.display(),
        proxies.len(),
        visitors.len()
    );
    Ok(())
}

async fn run(config_path: PathBuf, strict: bool) -> Result<()> {
    let registry = StatusRegistry::new();
    let engine: Arc<dyn TunnelEngine> = registry.clone();
    let manager = Arc::new(
        ConfigManager::load(config_path.clone(), DecodeOptions::with_strict(strict), engine)
            .with_context(|| format!("Failed to start from {}", config_path.display()))?,
    );

    tracing::info!(
        "Burrow started with {} (store {})",
        config_path.display(),
        if manager.store_enabled() { "enabled" } else { "disabled" }
    );

    tokio::select! {
        result = reload_on_hangup(manager.clone(), strict) => {
            result?;
        }
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received, closing proxies...");
        }
    }

    // Close the engine directly so shutdown waits for it
    tokio::task::spawn_blocking(move || registry.graceful_close(SHUTDOWN_GRACE_PERIOD)).await?;

    tracing::info!("Burrow shutdown complete");
    Ok(())
}

/// Reload the config file every time SIGHUP arrives
#[cfg(unix)]
async fn reload_on_hangup(manager: Arc<ConfigManager>, strict: bool) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
    while hangup.recv().await.is_some() {
        let manager = manager.clone();
        match tokio::task::spawn_blocking(move || manager.reload_from_file(strict)).await? {
            Ok(()) => tracing::info!("Config reloaded"),
            Err(e) => tracing::error!("Config reload failed: {}", e),
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn reload_on_hangup(_manager: Arc<ConfigManager>, _strict: bool) -> Result<()> {
    std::future::pending::<()>().await;
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM");
        }
    }
}
