//! Expiration directives for `put`.

use serde::{Deserialize, Serialize};

use ekv_common::{EkvError, EkvResult};

/// Caller-supplied expiry for a single write.
///
/// At most one field is expected. When both are set, `expiration_ttl` wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutOptions {
    /// Seconds from now until the entry expires.
    #[serde(rename = "expirationTtl", default, skip_serializing_if = "Option::is_none")]
    pub expiration_ttl: Option<i64>,
    /// Absolute expiry as Unix epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<i64>,
}

impl PutOptions {
    /// Expire `secs` seconds after the write.
    pub fn ttl(secs: i64) -> Self {
        PutOptions {
            expiration_ttl: Some(secs),
            expiration: None,
        }
    }

    /// Expire at the given epoch second.
    pub fn expires_at(epoch_secs: i64) -> Self {
        PutOptions {
            expiration_ttl: None,
            expiration: Some(epoch_secs),
        }
    }

    /// Resolves the directive into the single relative expiry sent to the store.
    ///
    /// Fails with `InvalidArgument` for a non-positive `expiration_ttl`.
    pub fn plan(&self, now_epoch_secs: u64) -> EkvResult<ExpiryPlan> {
        if let Some(ttl) = self.expiration_ttl {
            if ttl <= 0 {
                return Err(EkvError::invalid(format!(
                    "expirationTtl must be a positive number of seconds, got {ttl}"
                )));
            }
            if self.expiration.is_some() {
                tracing::debug!(ttl, "both expirationTtl and expiration set, using expirationTtl");
            }
            return Ok(ExpiryPlan::ExpiresIn(ttl as u64));
        }

        if let Some(expiration) = self.expiration {
            let now = i64::try_from(now_epoch_secs).unwrap_or(i64::MAX);
            let relative = expiration.saturating_sub(now);
            if relative <= 0 {
                return Ok(ExpiryPlan::AlreadyExpired);
            }
            return Ok(ExpiryPlan::ExpiresIn(relative as u64));
        }

        Ok(ExpiryPlan::Persistent)
    }
}

/// Store-level outcome of an expiration directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryPlan {
    /// Write without expiry.
    Persistent,
    /// Write with `EX <secs>`.
    ExpiresIn(u64),
    /// Skip the write; the entry would already be expired.
    AlreadyExpired,
}
