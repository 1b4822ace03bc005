//! # EdgeKV Client
//!
//! Handles for talking to the backing store: a TCP `Connection` for real
//! deployments and a `LocalExecutor` that runs commands against an
//! in-process engine.

pub mod config;
pub mod connection;
pub mod executor;

pub use config::{ClientConfig, DEFAULT_URL};
pub use connection::Connection;
pub use executor::{Executor, LocalExecutor};
