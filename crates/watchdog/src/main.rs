//! MuleCube watchdog
//!
//! Supervises the device's service containers: restarts unhealthy and
//! stopped critical services, and sheds non-essential ones when the CPU
//! runs hot or the battery runs low.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use watchdog_lib::runtime::{ContainerRuntime, DockerRuntime};
use watchdog_lib::stress::{HwMonitorClient, StressSource};
use watchdog_lib::{Reconciler, StructuredLogger};

mod config;

const WATCHDOG_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting mulecube-watchdog");

    let env = config::EnvConfig::load()?;
    let logger = StructuredLogger::new(env.device_name.clone());
    let config = env.into_watchdog_config()?;
    logger.log_startup(WATCHDOG_VERSION, &config);

    let runtime: Arc<dyn ContainerRuntime> = Arc::new(
        DockerRuntime::connect(config.docker_api_timeout)
            .context("Failed to connect to Docker daemon")?,
    );
    let stress: Arc<dyn StressSource> = Arc::new(HwMonitorClient::new(
        &config.hw_monitor_url,
        config.sensor_timeout,
    )?);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let reconciler = Reconciler::new(config, runtime, stress, logger.clone());
    let watchdog_handle = tokio::spawn(reconciler.run(shutdown_rx));

    let reason = shutdown_signal().await?;
    logger.log_shutdown(reason);

    let _ = shutdown_tx.send(());
    watchdog_handle.await?;
    info!("Shutdown complete");

    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            Ok("SIGINT received")
        }
        _ = terminate.recv() => Ok("SIGTERM received"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl-C received")
}
