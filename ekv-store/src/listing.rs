//! # Listing
//!
//! Turns one incremental `SCAN` step into a page of keys.
//!
//! ## Notes
//! - Each call issues exactly one `SCAN`. Callers page by passing the returned
//!   cursor back in; a cursor of `"0"` means the walk is complete.
//! - Keys within a page are sorted. Across pages only the store's scan
//!   guarantees apply: keys mutated during the walk may be skipped or repeated,
//!   and a page may be empty while `list_complete` is still false.
//! - Keys whose TTL has elapsed between the scan and the TTL lookup are not
//!   filtered out; their lookup reports `-2`.
//! - Key names must be UTF-8. A page holding any other key fails with
//!   `Protocol` rather than reporting a replacement name.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use ekv_common::{Command, EkvError, EkvResult, Frame, TtlStatus, escape_glob};

/// Page size used when the caller gives none.
pub const DEFAULT_LIST_LIMIT: usize = 1000;

/// Cursor that starts a walk, and that the store returns once it has wrapped.
pub const CURSOR_START: &str = "0";

/// Filters and pagination for `list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    /// Only return keys starting with this literal prefix.
    pub prefix: Option<String>,
    /// Scan count hint. `0` and `None` mean `DEFAULT_LIST_LIMIT`.
    pub limit: Option<usize>,
    /// Cursor from a previous page. Empty and `None` start a new walk.
    pub cursor: Option<String>,
}

impl ListOptions {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    /// Builds `SCAN <cursor> MATCH <prefix>* COUNT <limit>` with defaults applied.
    pub(crate) fn scan_command(&self) -> Command {
        let cursor = self
            .cursor
            .as_deref()
            .filter(|cursor| !cursor.is_empty())
            .unwrap_or(CURSOR_START);
        let pattern = format!("{}*", escape_glob(self.prefix.as_deref().unwrap_or("")));
        let limit = self.limit.filter(|&limit| limit > 0).unwrap_or(DEFAULT_LIST_LIMIT);

        Command::new("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(limit.to_string())
    }
}

/// One page of a listing.
#[derive(Debug, Serialize)]
pub struct ListPage<K> {
    /// Keys in this page, sorted ascending.
    pub keys: Vec<K>,
    /// Cursor to pass back for the next page.
    pub cursor: String,
    /// True once the walk has wrapped (`cursor == "0"`).
    pub list_complete: bool,
}

impl<K> ListPage<K> {
    pub(crate) fn new(keys: Vec<K>, cursor: String) -> Self {
        let list_complete = cursor == CURSOR_START;
        ListPage {
            keys,
            cursor,
            list_complete,
        }
    }
}

/// A listed key with its TTL already resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    pub name: String,
    /// Store-native TTL reply: seconds left, `-1` no expiry, `-2` gone.
    pub ttl: i64,
    /// Absolute expiry in epoch seconds, when the key expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<u64>,
}

impl KeyInfo {
    pub(crate) fn new(name: String, ttl: i64, now_epoch_secs: u64) -> Self {
        let expiration = TtlStatus::from_reply(ttl).expiration_at(now_epoch_secs);
        KeyInfo {
            name,
            ttl,
            expiration,
        }
    }

    pub fn ttl_status(&self) -> TtlStatus {
        TtlStatus::from_reply(self.ttl)
    }
}

/// A listed key whose TTL lookup is still running.
#[derive(Debug)]
pub struct PendingKey {
    pub name: String,
    pub ttl: TtlLookup,
}

/// Background TTL lookup attached to a `PendingKey`.
///
/// Await it to get the store-native TTL reply. Dropping it detaches the
/// lookup without cancelling it.
#[derive(Debug)]
pub struct TtlLookup {
    handle: JoinHandle<EkvResult<i64>>,
}

impl TtlLookup {
    pub(crate) fn spawn<F>(lookup: F) -> Self
    where
        F: Future<Output = EkvResult<i64>> + Send + 'static,
    {
        TtlLookup {
            handle: tokio::spawn(lookup),
        }
    }

    /// True once the lookup has finished, successfully or not.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Future for TtlLookup {
    type Output = EkvResult<i64>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(|joined| {
            joined.unwrap_or_else(|err| Err(EkvError::Internal(format!("ttl lookup did not complete: {err}"))))
        })
    }
}

/// Splits a `SCAN` reply into the next cursor and the keys, sorted.
pub(crate) fn parse_scan_reply(reply: Frame) -> EkvResult<(String, Vec<String>)> {
    let mut parts = reply.into_array()?.into_iter();
    let (Some(cursor), Some(keys), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(EkvError::protocol("SCAN reply must have exactly two elements"));
    };
    let cursor = cursor.into_text()?;
    let mut names = keys
        .into_array()?
        .into_iter()
        .map(key_name)
        .collect::<EkvResult<Vec<_>>>()?;
    names.sort_unstable();
    Ok((cursor, names))
}

fn key_name(frame: Frame) -> EkvResult<String> {
    match frame {
        Frame::Bulk(raw) => String::from_utf8(raw.to_vec())
            .map_err(|_| EkvError::protocol(format!("scanned key {raw:?} is not valid UTF-8"))),
        other => other.into_text(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cmd: &Command) -> Vec<String> {
        cmd.args()
            .iter()
            .map(|a| String::from_utf8_lossy(a).into_owned())
            .collect()
    }

    #[test]
    fn scan_command_applies_defaults() {
        let cmd = ListOptions::default().scan_command();
        assert_eq!(args(&cmd), ["SCAN", "0", "MATCH", "*", "COUNT", "1000"]);
    }

    #[test]
    fn zero_limit_and_empty_cursor_fall_back_to_defaults() {
        let cmd = ListOptions::default().with_limit(0).with_cursor("").scan_command();
        assert_eq!(args(&cmd), ["SCAN", "0", "MATCH", "*", "COUNT", "1000"]);
    }

    #[test]
    fn scan_command_uses_prefix_limit_and_cursor() {
        let cmd = ListOptions::default()
            .with_prefix("user:")
            .with_limit(25)
            .with_cursor("96")
            .scan_command();
        assert_eq!(args(&cmd), ["SCAN", "96", "MATCH", "user:*", "COUNT", "25"]);
    }

    #[test]
    fn prefix_metacharacters_are_escaped() {
        let cmd = ListOptions::default().with_prefix("a*[b]").scan_command();
        assert_eq!(args(&cmd)[3], r"a\*\[b\]*");
    }

    #[test]
    fn page_completion_follows_cursor() {
        assert!(ListPage::<String>::new(vec![], "0".into()).list_complete);
        assert!(!ListPage::<String>::new(vec![], "12".into()).list_complete);
    }

    #[test]
    fn parses_and_sorts_scan_reply() {
        let reply = Frame::Array(vec![
            Frame::bulk("7"),
            Frame::Array(vec![Frame::bulk("b"), Frame::bulk("a"), Frame::bulk("c")]),
        ]);
        let (cursor, keys) = parse_scan_reply(reply).unwrap();
        assert_eq!(cursor, "7");
        assert_eq!(keys, ["a", "b", "c"]);
    }

    #[test]
    fn rejects_malformed_scan_reply() {
        assert!(parse_scan_reply(Frame::Array(vec![Frame::bulk("0")])).is_err());
        assert!(parse_scan_reply(Frame::Integer(3)).is_err());
        assert!(
            parse_scan_reply(Frame::Array(vec![Frame::bulk("0"), Frame::Integer(1)])).is_err()
        );
    }

    #[test]
    fn non_utf8_key_names_are_rejected() {
        let reply = Frame::Array(vec![
            Frame::bulk("0"),
            Frame::Array(vec![Frame::bulk("ok"), Frame::Bulk(bytes::Bytes::from_static(b"caf\xff"))]),
        ]);
        assert!(matches!(parse_scan_reply(reply), Err(EkvError::Protocol(_))));
    }

    #[test]
    fn key_info_derives_expiration() {
        let info = KeyInfo::new("k".into(), 30, 1_000);
        assert_eq!(info.expiration, Some(1_030));
        assert_eq!(info.ttl_status(), TtlStatus::ExpiresIn(std::time::Duration::from_secs(30)));
        assert_eq!(KeyInfo::new("k".into(), -1, 1_000).expiration, None);
    }

    #[tokio::test]
    async fn ttl_lookup_resolves_and_reports_panics() {
        let ok = TtlLookup::spawn(async { Ok(42) });
        assert_eq!(ok.await.unwrap(), 42);

        let failed = TtlLookup::spawn(async {
            let explode = true;
            if explode {
                panic!("lookup exploded");
            }
            Ok(0)
        });
        assert!(matches!(failed.await, Err(EkvError::Internal(_))));
    }
}
