//! OSC listener
//!
//! Listens for OSC over UDP, coalesces messages per sender and address, and prints a batch of
//! the latest values every emission period until Ctrl+C or SIGTERM.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use osc_listener_service::{
    initialize_logging, load_config, setup_signal_handlers, Cli, ListenerService,
};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(&cli).context("Failed to load configuration")?;

    initialize_logging(&config.logging)?;
    info!("Starting OSC listener v{}", env!("CARGO_PKG_VERSION"));

    let mut service = ListenerService::new(&config).await?;
    if service.bind_error().is_some() {
        // The engine has already reported the bind failure
        return Ok(ExitCode::FAILURE);
    }
    service.start()?;

    let shutdown_signal = setup_signal_handlers()?;
    info!("OSC listener is running. Press Ctrl+C to shutdown gracefully.");
    let _ = shutdown_signal.await;

    service.shutdown().await?;
    info!("OSC listener shutdown complete");
    Ok(ExitCode::SUCCESS)
}
