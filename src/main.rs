//! Gatekeeper service.
//!
//! ```text
//!     Client Request
//!     ──▶ listener ──▶ layers (request id, trace, CORS, timeout, limits)
//!                          │
//!            ┌─────────────┼──────────────────────┐
//!            ▼             ▼                      ▼
//!     /healthz /livez   /admin/*            everything else
//!                       (admin key)               │
//!                                                 ▼
//!                                  ┌──────────────────────────────┐
//!                                  │ gatekeeper                   │
//!                                  │  block? → slowdown → bearer  │
//!                                  │  → token → HMAC signature    │
//!                                  │  abuse tracker ◀── cleanup   │
//!                                  └──────────────┬───────────────┘
//!                                                 ▼
//!                                          /api/v1/items
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use gatekeeper::config::{self, GatekeeperConfig};
use gatekeeper::http::HttpServer;
use gatekeeper::lifecycle::{shutdown_signal, Shutdown};
use gatekeeper::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "gatekeeper", version, about = "Authenticating API gatekeeper")]
struct Args {
    /// TOML config file. Without it, configuration comes from the environment.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config: GatekeeperConfig = match &args.config {
        Some(path) => config::load_config(path)?,
        None => config::load_from_env()?,
    };

    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        admin_enabled = config.admin.enabled,
        "gatekeeper starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    let server = HttpServer::new(config);
    let server_task = tokio::spawn(server.run(listener, server_shutdown));

    shutdown.trigger_on(shutdown_signal()).await;

    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
