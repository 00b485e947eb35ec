//! Real-time bidding server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Exchange / browser
//!     ──────────────────▶ http server (one axum service per listener)
//!                              │
//!                              ▼
//!                         route table (port features, path, method)
//!                              │
//!                              ▼
//!                         receiver (bid / impression / click / match / admin)
//!                              │
//!                              ▼
//!                         interceptor controller ──▶ chain of interceptors
//!                              │
//!     ◀──────────────────  serialized response
//!
//!     Cross-cutting: config (+ hot reload), logging, metrics, lifecycle
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use rtb_bidder::config::{load_config, BidderConfig, ConfigWatcher};
use rtb_bidder::interceptor::Registries;
use rtb_bidder::lifecycle::signals::wait_for_signal;
use rtb_bidder::observability::{logging, metrics};
use rtb_bidder::{BidderApp, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "rtb-bidder", version, about = "Real-time bidding server")]
struct Args {
    /// TOML configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => BidderConfig::default(),
    };

    logging::init(&config.observability.log_level, config.observability.log_json);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rtb-bidder starting");
    tracing::info!(
        exchange = %config.exchange,
        listeners = config.listeners.len(),
        request_timeout_ms = config.timeouts.request_ms,
        "Configuration loaded"
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

    let app = Arc::new(BidderApp::from_config(config, &Registries::default())?);

    // Start hooks may block.
    let starting = Arc::clone(&app);
    tokio::task::spawn_blocking(move || starting.start()).await??;

    let server = match HttpServer::bind(app.router(), app.config()).await {
        Ok(server) => server,
        Err(e) => {
            let stopping = Arc::clone(&app);
            tokio::task::spawn_blocking(move || stopping.shutdown()).await?;
            return Err(e.into());
        }
    };

    // Keep the watcher alive for the life of the server.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            app.watch_settings(updates);
            match watcher.run() {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::warn!(error = %e, "Config hot reload disabled");
                    None
                }
            }
        }
        None => None,
    };

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Shutdown signal received");
        trigger.trigger();
    });

    let served = server.run(shutdown).await;

    let stopping = Arc::clone(&app);
    tokio::task::spawn_blocking(move || stopping.shutdown()).await?;

    served?;
    tracing::info!("Shutdown complete");
    Ok(())
}
