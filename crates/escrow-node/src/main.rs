//! # Escrow Node
//!
//! Entry point: telemetry, configuration, runtime, Ctrl+C shutdown.

use anyhow::{Context, Result};
use escrow_node::{NodeConfig, NodeRuntime};
use escrow_telemetry::{init_telemetry, TelemetryConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry(&TelemetryConfig::from_env()).context("Failed to initialize telemetry")?;

    let config = NodeConfig::from_env().context("Invalid configuration")?;
    info!(
        data_dir = ?config.data_dir,
        max_create_attempts = config.coordinator.max_create_attempts,
        recovery_interval_secs = config.coordinator.recovery.interval_secs,
        "Configuration loaded"
    );

    let mut runtime = NodeRuntime::new(&config)?;
    runtime.start().await?;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    Ok(())
}
