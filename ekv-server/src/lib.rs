//! Development RESP server backed by the in-memory engine.

pub mod metrics;
pub mod server;

pub use metrics::Metrics;
pub use server::{ServerState, bind_listener, handle_connection, serve};
