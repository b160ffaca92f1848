//! Authenticating reverse-proxy gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────────┐
//!                 │                        GATEWAY                           │
//!                 │                                                          │
//!  Client ───────▶│  http server ──▶ auth ──▶ policy ──▶ routing ──▶ forward │──────▶ Target
//!                 │  (request id,    (token,   (named     (templates, (pool,  │
//!  Client ◀───────│   trace,         cache)    policies)  host/method) retry) │◀────── Target
//!                 │   deadline)                                              │
//!                 │                                                          │
//!                 │  config + watcher ──▶ snapshot store (atomic swap)        │
//!                 │  observability: logging, metrics, audit                  │
//!                 └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use auth_gateway::config::{load_config, watcher::ConfigWatcher};
use auth_gateway::lifecycle::{wait_for_signal, Shutdown};
use auth_gateway::observability::{logging, metrics};
use auth_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "auth-gateway")]
#[command(about = "Authenticating reverse-proxy gateway", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    if cli.check {
        // Loading the key and compiling templates can still fail.
        GatewayServer::new(&config)?;
        println!("{}: ok", cli.config.display());
        return Ok(());
    }

    logging::init(&config.observability)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        "auth-gateway starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = GatewayServer::new(&config)?;

    let (watcher, updates) = ConfigWatcher::new(&cli.config);
    // Dropping the handle stops the watch.
    let _watch = watcher.run()?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        routes = config.routes.len(),
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    let stopped = shutdown.subscribe();
    let server_task = tokio::spawn(server.run(listener, updates, stopped));

    wait_for_signal().await;
    shutdown.trigger();
    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
