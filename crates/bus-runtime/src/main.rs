//! Quantum-Bus runtime entry point.

use anyhow::Result;
use bus_runtime::{load_config, BusRuntime};
use bus_telemetry::{init_telemetry, TelemetryConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::from_env()).await?;

    let (config, capacity) = load_config()?;
    let runtime = BusRuntime::new(config, capacity)?;
    runtime.start()?;

    match runtime.probe("hello").await {
        Ok(reply) => info!(
            message = %reply.message,
            handled_at_ms = reply.handled_at_ms,
            "Request/response path is healthy"
        ),
        Err(e) => error!(error = %e, "Request/response probe failed"),
    }

    info!("Bus is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;

    match runtime.metrics_text() {
        Ok(metrics) => info!("Final metrics:\n{metrics}"),
        Err(e) => error!(error = %e, "Failed to encode metrics"),
    }

    Ok(())
}
