//! # banterd
//!
//! Banter relay server binary — loads configuration, wires up the server,
//! and runs until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use banter_server::config::ServerConfig;
use banter_server::metrics;
use banter_server::server::BanterServer;

/// Banter relay server.
#[derive(Parser, Debug)]
#[command(name = "banterd", about = "Banter relay server")]
struct Cli {
    /// Host to bind (overrides config file and environment).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides config file and environment).
    #[arg(long)]
    port: Option<u16>,

    /// Path to a JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bot reply delay in milliseconds (overrides config file and environment).
    #[arg(long)]
    reply_delay_ms: Option<u64>,
}

/// CLI flags win over both the config file and environment overrides.
fn apply_cli_overrides(config: &mut ServerConfig, args: &Cli) {
    if let Some(host) = &args.host {
        config.host.clone_from(host);
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(delay) = args.reply_delay_ms {
        config.reply_delay_ms = delay;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    apply_cli_overrides(&mut config, &args);

    let metrics_handle = metrics::install_recorder();
    let server = BanterServer::new(config, metrics_handle);

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("Banter relay listening on http://{addr}");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server
        .shutdown()
        .graceful_shutdown(
            server.relay(),
            vec![handle],
            Some(server.config().shutdown_timeout()),
        )
        .await;

    tracing::info!("Shutdown complete");
    Ok(())
}
