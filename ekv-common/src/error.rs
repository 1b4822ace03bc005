//! # EdgeKV Error Types
//!
//! ## Design Principles
//!
//! 1. **Stable Codes**: Each variant maps to a fixed numeric code for process
//!    exit statuses and log correlation.
//! 2. **Categorized Ranges**: Codes are grouped by intent (client, server,
//!    transient, protocol).
//! 3. **Wrapped Causes**: Store and transport failures carry the original
//!    message so nothing is swallowed on the way to the caller.
//! 4. **Recoverability Hints**: Transient errors are explicitly marked as
//!    retryable. Nothing in EdgeKV retries on its own.

use thiserror::Error;

/// Result type used across EdgeKV components.
pub type EkvResult<T> = core::result::Result<T, EkvError>;

/// High-level category for grouping error codes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum EkvErrorCategory {
    /// Invalid input or user request issues.
    Client,
    /// Backing store or internal invariant failures.
    Server,
    /// Transport conditions such as a dropped connection.
    Transient,
    /// Malformed or unexpected wire data.
    Protocol,
}

impl EkvErrorCategory {
    /// Returns true if the category is safe to retry.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Transient)
    }
}

/// Errors surfaced by every EdgeKV operation.
#[derive(Debug, Error)]
pub enum EkvError {
    /// Client error: malformed expiry directive, unknown value kind, bad config (code 1).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Client error: key not present in the backing store (code 2).
    #[error("key not found: {0}")]
    NotFound(String),
    /// Client error: a stored value could not be decoded as JSON (code 3).
    #[error("decode failure: {0}")]
    Decode(#[from] serde_json::Error),

    /// Server error: the backing store answered with an error reply (code 10).
    #[error("backing store error: {0}")]
    Store(String),
    /// Server error: a spawned lookup panicked or was cancelled (code 11).
    #[error("internal error: {0}")]
    Internal(String),

    /// Transient error: the connection to the backing store failed (code 20).
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol error: the reply could not be parsed or had the wrong shape (code 30).
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl EkvError {
    /// Returns the stable numeric code for the error.
    pub const fn code(&self) -> u16 {
        match self {
            Self::InvalidArgument(_) => 1,
            Self::NotFound(_) => 2,
            Self::Decode(_) => 3,
            Self::Store(_) => 10,
            Self::Internal(_) => 11,
            Self::Io(_) => 20,
            Self::Protocol(_) => 30,
        }
    }

    /// Returns the coarse category of the error.
    pub const fn category(&self) -> EkvErrorCategory {
        match self {
            Self::InvalidArgument(_) | Self::NotFound(_) | Self::Decode(_) => {
                EkvErrorCategory::Client
            }
            Self::Store(_) | Self::Internal(_) => EkvErrorCategory::Server,
            Self::Io(_) => EkvErrorCategory::Transient,
            Self::Protocol(_) => EkvErrorCategory::Protocol,
        }
    }

    /// Returns true if callers could reasonably retry the operation.
    pub const fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Shorthand for an `InvalidArgument` error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Shorthand for a `Protocol` error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}
