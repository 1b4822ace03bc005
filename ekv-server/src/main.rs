//! # EdgeKV Development Server
//!
//! Redis-compatible TCP server over the in-memory engine, for local
//! development and integration tests of the KV namespace.
//!
//! Environment:
//! - `EKV_ADDR`: listen address, default `127.0.0.1:6379`.
//! - `RUST_LOG`: tracing filter, default `info`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use ekv_engine::MemoryEngine;
use ekv_server::{ServerState, bind_listener, serve};

const DEFAULT_ADDR: &str = "127.0.0.1:6379";
const EXPIRE_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let raw_addr = std::env::var("EKV_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let addr: SocketAddr = raw_addr.parse().map_err(|err| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("EKV_ADDR {raw_addr:?}: {err}"))
    })?;
    let listener = bind_listener(addr)?;

    let engine = Arc::new(MemoryEngine::new());
    let expirer = engine.start_expirer(EXPIRE_INTERVAL);
    let state = Arc::new(ServerState::new(engine));

    tracing::info!(%addr, "listening");
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    serve(listener, state, shutdown).await?;
    expirer.stop();
    Ok(())
}
