//! # FinTrack Node
//!
//! Single-process deployment of the transaction pipeline:
//!
//! ```text
//!  HTTP ──→ Ingestion Gateway ──publish──→ Queue ──→ Consumer ──upsert──→ Store
//!   │                                                                      ↑
//!   └──────────────→ Report Engine ──cache-aside──→ Cache                  │
//!                          └──────────────────── query ───────────────────┘
//! ```
//!
//! Configuration comes from `FT_*` environment variables (see `config`),
//! log filtering from `RUST_LOG` (default `info`).

use anyhow::{Context, Result};
use fintrack_node::{load_config, NodeRuntime, ServiceContainer};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting FinTrack node");

    let config = load_config().context("invalid configuration")?;
    let listen_addr = config.server.listen_addr();

    let container = ServiceContainer::new(config).context("failed to build services")?;
    let runtime = NodeRuntime::new(container);
    runtime.start();

    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;

    let served = runtime
        .serve_until(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
        })
        .await;

    runtime.shutdown().await;
    served.context("HTTP server failed")
}
