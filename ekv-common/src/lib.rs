// ekv-common - Shared error, protocol and value types for EdgeKV
//
// This crate defines the RESP2 codec used between the shim and the backing store

pub mod error;
pub mod glob;
pub mod protocol;
pub mod types;

// Re-export for convenience
pub use error::*;
pub use glob::{escape_glob, glob_match};
pub use protocol::*;
pub use types::*;
