//! # Storage Engine Interface
//!
//! ## Design Principles
//!
//! 1. **Strategy Pattern**: Abstract the engine behind a trait so the command
//!    dispatcher does not care which store sits underneath.
//! 2. **Binary-Safe API**: Keys/values are byte buffers to match Redis semantics.
//! 3. **Zero-Cost Dispatch**: When used with generics, calls monomorphize to
//!    avoid dynamic dispatch overhead.
//! 4. **Explicit TTL**: Expose expiration via dedicated methods to keep the
//!    hot read path minimal.

use std::time::Duration;

use bytes::Bytes;
use ekv_common::{EkvResult, TtlStatus};

/// Write precondition for `SET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetCondition {
    /// Always write.
    #[default]
    Always,
    /// Only write when the key is absent (`NX`).
    IfAbsent,
    /// Only write when the key is present (`XX`).
    IfPresent,
}

/// Options accompanying a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetOptions {
    /// Relative expiry; `None` stores the key without expiration.
    pub ttl: Option<Duration>,
    /// Write precondition.
    pub condition: SetCondition,
}

impl SetOptions {
    /// Options for a plain write that expires after `ttl`.
    pub fn expiring(ttl: Duration) -> Self {
        SetOptions {
            ttl: Some(ttl),
            condition: SetCondition::Always,
        }
    }
}

/// One step of an incremental key walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor to resume from; `0` once the walk has wrapped.
    pub next_cursor: u64,
    /// Matching keys visited in this step.
    pub keys: Vec<Vec<u8>>,
}

/// Strategy pattern: defines the engine behavior surface for the dispatcher.
///
/// Keys and values are treated as bulk strings (binary-safe).
pub trait KVEngine: Send + Sync {
    /// Returns the value for a key, or `None` if missing or expired.
    fn get(&self, key: &[u8]) -> EkvResult<Option<Bytes>>;

    /// Writes a key. Returns false when the precondition prevented the write.
    fn set(&self, key: Vec<u8>, value: Bytes, options: SetOptions) -> EkvResult<bool>;

    /// Removes a key. Returns true if the key existed and was removed.
    fn delete(&self, key: &[u8]) -> EkvResult<bool>;

    /// Returns true if the key exists and has not expired.
    fn exists(&self, key: &[u8]) -> EkvResult<bool>;

    /// Sets an expiration on a key. Returns false if the key is missing.
    fn expire(&self, key: &[u8], ttl: Duration) -> EkvResult<bool>;

    /// Returns the TTL state for a key.
    fn ttl(&self, key: &[u8]) -> EkvResult<TtlStatus>;

    /// Visits up to `count` keys starting at `cursor`, keeping those matching
    /// the optional glob `pattern`.
    fn scan(&self, cursor: u64, pattern: Option<&[u8]>, count: usize) -> EkvResult<ScanPage>;

    /// Returns every live key matching `pattern`.
    fn keys(&self, pattern: &[u8]) -> EkvResult<Vec<Vec<u8>>>;

    /// Number of live keys.
    fn len(&self) -> EkvResult<usize>;

    /// Returns true if no live keys are stored.
    fn is_empty(&self) -> EkvResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Removes every key.
    fn clear(&self) -> EkvResult<()>;
}
