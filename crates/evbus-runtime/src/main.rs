//! # evbus
//!
//! Runs a broker configured from `EVBUS_CONFIG`, reading NDJSON events from
//! stdin until EOF or Ctrl+C.

use anyhow::{Context, Result};
use evbus_runtime::{init_logging, produce_from, BusRuntime, RuntimeConfig, TelemetryConfig};
use tokio::io::BufReader;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(&TelemetryConfig::from_env()).context("initializing logging")?;

    let config = RuntimeConfig::load().context("loading configuration")?;
    let mut runtime = BusRuntime::new(&config).context("building broker")?;
    runtime.start().await;

    let broker = runtime.broker();
    info!("Broker is running. Reading events from stdin, Ctrl+C to stop.");

    tokio::select! {
        produced = produce_from(&broker, BufReader::new(tokio::io::stdin())) => {
            match produced {
                Ok(count) => info!(produced = count, "Input exhausted"),
                Err(e) => warn!(error = %e, "Reading stdin failed"),
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("waiting for Ctrl+C")?;
            info!("Interrupt received");
        }
    }

    runtime.shutdown(config.shutdown_grace()).await;
    Ok(())
}
