//! Logwarden control-plane binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use logwarden::ai::Summarizer;
use logwarden::api::{router, AppState};
use logwarden::domain::ports::SystemClock;
use logwarden::infrastructure::config::ConfigLoader;
use logwarden::infrastructure::database::{DatabaseConnection, SqliteControlStore};
use logwarden::infrastructure::logging;
use logwarden::services::{DispatchTuning, Dispatcher};

#[derive(Parser)]
#[command(name = "logwarden", version, about = "Control plane for log-operations agents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the control-plane HTTP server.
    Serve {
        /// Path to the YAML config file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Listen address override, e.g. 0.0.0.0:8787.
        #[arg(long)]
        listen: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve { config, listen } => serve(config, listen).await,
    }
}

async fn serve(config_path: Option<PathBuf>, listen: Option<String>) -> Result<()> {
    let mut config = ConfigLoader::load(config_path.as_deref())?;
    if let Some(listen) = listen {
        config.server.listen = listen;
    }
    logging::init(&config.logging)?;

    std::fs::create_dir_all(&config.database.data_dir).with_context(|| {
        format!("failed to create data directory {}", config.database.data_dir)
    })?;
    let database_url = format!("sqlite:{}/control.db", config.database.data_dir);
    let db = DatabaseConnection::new(&database_url).await?;
    db.migrate().await?;

    let store = Arc::new(SqliteControlStore::new(db.pool().clone()));
    let dispatcher = Arc::new(
        Dispatcher::load(
            store,
            Arc::new(SystemClock),
            DispatchTuning::from(config.dispatch),
        )
        .await?,
    );

    let config = Arc::new(config);
    let summarizer = Arc::new(Summarizer::new(config.clone()));

    let app = router(AppState {
        dispatcher,
        summarizer,
    });

    let listener = tokio::net::TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen))?;
    info!(addr = %config.server.listen, "control plane listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received, stopping");
}
