//! The tracking daemon command.

use std::time::Duration;

use anyhow::{Context, Result};

use ht_core::{HyprlandIpc, Tracker};
use ht_db::Database;

use crate::Config;

/// Runs the tracker until SIGINT or SIGTERM, then stops it gracefully.
pub async fn run(config: &Config) -> Result<()> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;

    let ipc = HyprlandIpc::from_env().context("failed to initialize Hyprland IPC")?;
    let tracker = Tracker::start(ipc, db, Duration::from_secs(config.flush_interval_secs))
        .await
        .context("failed to start tracker")?;

    wait_for_shutdown_signal().await?;
    tracing::info!("shutting down");
    tracker.stop().await;
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("failed to listen for ctrl-c")?,
        _ = sigterm.recv() => {}
    }
    Ok(())
}
