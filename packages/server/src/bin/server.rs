//! Bleachers chat server instance.
//!
//! Accepts WebSocket chat connections and admission calls, and cooperates with
//! the other instances through the shared store, broker and queue.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin bleachers-server
//! cargo run --bin bleachers-server -- --host 0.0.0.0 --port 3000 \
//!     --stub-profiles packages/server/fixtures/profiles.json \
//!     --seed-games packages/server/fixtures/games.json
//! ```

use std::sync::Arc;

use bleachers_server::{
    config::{CliArgs, ServerConfig},
    node::{Backends, ChatNode, InMemoryCluster},
    ui::shutdown_signal,
};
use bleachers_shared::{
    logger::setup_logger,
    time::{Clock, SystemClock},
};
use clap::Parser;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    let config = match ServerConfig::try_from(args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let backends = connect_backends(&config, clock.clone()).await?;

    let bind_addr = config.bind_addr();
    let node = ChatNode::build(config, backends, clock).await?;
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Connect to: ws://{}/ws/chat/{{roomId}}?ticket=...", bind_addr);
    tracing::info!("Press Ctrl+C to shutdown gracefully");

    node.serve(listener, shutdown_signal()).await?;
    Ok(())
}

#[cfg(feature = "redis-backend")]
async fn connect_backends(
    config: &ServerConfig,
    clock: Arc<dyn Clock>,
) -> Result<Backends, Box<dyn std::error::Error>> {
    match config.redis_url.as_deref() {
        Some(url) => {
            tracing::info!("Using Redis at {}", url);
            Ok(Backends::redis(url).await?)
        }
        None => Ok(standalone(clock)),
    }
}

#[cfg(not(feature = "redis-backend"))]
async fn connect_backends(
    _config: &ServerConfig,
    clock: Arc<dyn Clock>,
) -> Result<Backends, Box<dyn std::error::Error>> {
    Ok(standalone(clock))
}

fn standalone(clock: Arc<dyn Clock>) -> Backends {
    tracing::warn!("No shared backend configured; running as a single in-memory instance");
    InMemoryCluster::new(clock).backends()
}
