pub mod commands;
pub mod engine;
pub mod memory;

pub use commands::execute;
pub use engine::{KVEngine, ScanPage, SetCondition, SetOptions};
pub use memory::{ExpirerHandle, MemoryEngine};
