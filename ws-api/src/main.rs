use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use ws_api::{create_app, AppState};
use ws_config::ConfigLoader;
use ws_orchestrator::build_components;

/// Launches and tracks per-user workspaces.
#[derive(Debug, Parser)]
#[command(name = "ws-api", version, about)]
struct Cli {
    /// Configuration file; otherwise WS_CONFIG, ./ws.yaml, /etc/ws/config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured bind address
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loader = match &cli.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load()?;
    if let Some(bind) = cli.bind {
        config.server.bind_addr = bind;
    }

    let _log_guard =
        ws_logging::init_subscriber(&config.logging).context("Failed to initialize logging")?;

    info!("Starting ws-api service...");
    info!(
        "Configuration loaded: bind_addr={}, apps={}, store={}",
        config.server.bind_addr,
        config.containers.len(),
        config
            .paymodel_db
            .as_ref()
            .map_or_else(|| "none".to_string(), |p| p.display().to_string())
    );

    let components = build_components(&config)
        .await
        .context("Failed to set up backends")?;
    let app = create_app(AppState::from(components));

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!("Listening on http://{}", config.server.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
