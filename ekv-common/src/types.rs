//! Shared value types.

use std::time::Duration;

/// TTL reply value for a key that exists without an expiration.
pub const TTL_NO_EXPIRY: i64 = -1;

/// TTL reply value for a key that does not exist.
pub const TTL_MISSING: i64 = -2;

/// TTL query result for Redis-style semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlStatus {
    /// Key does not exist or is already expired.
    Missing,
    /// Key exists but has no expiration set.
    NoExpiry,
    /// Key expires after the given duration.
    ExpiresIn(Duration),
}

impl TtlStatus {
    /// Interprets a `TTL` integer reply (seconds, with `-1`/`-2` sentinels).
    ///
    /// Any other negative value is treated as missing.
    pub fn from_reply(reply: i64) -> Self {
        match reply {
            TTL_NO_EXPIRY => TtlStatus::NoExpiry,
            n if n < 0 => TtlStatus::Missing,
            n => TtlStatus::ExpiresIn(Duration::from_secs(n as u64)),
        }
    }

    /// Encodes the status as a `TTL` reply, rounding to the nearest second.
    pub fn to_secs_reply(self) -> i64 {
        match self {
            TtlStatus::Missing => TTL_MISSING,
            TtlStatus::NoExpiry => TTL_NO_EXPIRY,
            TtlStatus::ExpiresIn(left) => ((left.as_millis() + 500) / 1000) as i64,
        }
    }

    /// Encodes the status as a `PTTL` reply.
    pub fn to_millis_reply(self) -> i64 {
        match self {
            TtlStatus::Missing => TTL_MISSING,
            TtlStatus::NoExpiry => TTL_NO_EXPIRY,
            TtlStatus::ExpiresIn(left) => left.as_millis() as i64,
        }
    }

    /// Absolute expiration in epoch seconds, given the current epoch time.
    pub fn expiration_at(self, now_epoch_secs: u64) -> Option<u64> {
        match self {
            TtlStatus::ExpiresIn(left) => Some(now_epoch_secs + left.as_secs()),
            _ => None,
        }
    }
}

/// Current wall-clock time in whole epoch seconds.
pub fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_ttl_sentinels() {
        assert_eq!(TtlStatus::from_reply(-2), TtlStatus::Missing);
        assert_eq!(TtlStatus::from_reply(-1), TtlStatus::NoExpiry);
        assert_eq!(
            TtlStatus::from_reply(30),
            TtlStatus::ExpiresIn(Duration::from_secs(30))
        );
    }

    #[test]
    fn rounds_seconds_reply() {
        let status = TtlStatus::ExpiresIn(Duration::from_millis(9_600));
        assert_eq!(status.to_secs_reply(), 10);
        assert_eq!(status.to_millis_reply(), 9_600);
        assert_eq!(TtlStatus::Missing.to_secs_reply(), TTL_MISSING);
    }

    #[test]
    fn computes_absolute_expiration() {
        let status = TtlStatus::ExpiresIn(Duration::from_secs(60));
        assert_eq!(status.expiration_at(1_000), Some(1_060));
        assert_eq!(TtlStatus::NoExpiry.expiration_at(1_000), None);
    }
}
