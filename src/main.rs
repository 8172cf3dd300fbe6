//! Multi-Room Chat Server - Entry Point
//!
//! Initializes logging, binds the TCP listener, and runs the accept loop.

use std::env;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use room_chat::{serve, ServerCore};

/// Default server address
const DEFAULT_ADDR: &str = "127.0.0.1:1234";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=room_chat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("room_chat=info")),
        )
        .init();

    // Get bind address from command line or use default
    let addr = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());

    // A bind failure is the one fatal startup fault: report it once and
    // do not proceed to accept connections
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            return Err(e.into());
        }
    };
    info!("Chat server listening on {}", addr);

    let core = Arc::new(ServerCore::new());
    serve(listener, core).await;

    Ok(())
}
