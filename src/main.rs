//! Large response server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request          ┌──────────────────────────────────────────────────┐
//!     ────────────────────────┼─▶ request id / trace / timeout (tower-http)       │
//!                             │        │                                          │
//!                             │        ▼                                          │
//!                             │   LargeResponseLayer ──▶ application handler      │
//!                             │        │                                          │
//!                             │        ▼                                          │
//!                             │   ResponseSizeGuard ──▶ PayloadOffloader ─────────┼──▶ object store
//!     Client Response         │        │                                          │
//!     ◀───────────────────────┼────────┘  pass | warn | reference | 413           │
//!                             └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use large_response::config::{load_config, LargeResponseConfig};
use large_response::http::HttpServer;
use large_response::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "large-response-server")]
#[command(about = "HTTP server guarding against oversized responses", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => LargeResponseConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "large-response server starting");

    tracing::info!(
        config_file = ?args.config,
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.listener.request_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config)?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
