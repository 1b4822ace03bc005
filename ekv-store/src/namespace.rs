//! # KV Namespace
//!
//! The caller-facing API: put, get, list, TTL, delete and ping over a shared
//! backing-store handle.
//!
//! ## Design Principles
//!
//! 1. **Store Is Truth**: No local cache. Every read goes to the store.
//! 2. **One Command Per Call**: Each operation issues a single store command,
//!    except listing, which adds one `TTL` lookup per returned key.
//! 3. **Validate First**: Argument errors are raised before the store is touched.
//! 4. **Surface Everything**: Store and transport errors reach the caller
//!    unchanged. Nothing is retried.

use std::collections::BTreeSet;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::try_join_all;
use serde::de::DeserializeOwned;

use ekv_client::Executor;
use ekv_common::{Command, EkvError, EkvResult, epoch_secs};

use crate::expiry::{ExpiryPlan, PutOptions};
use crate::listing::{KeyInfo, ListOptions, ListPage, PendingKey, TtlLookup, parse_scan_reply};
use crate::value::{KvValue, ValueKind};

/// Edge-style KV namespace backed by a RESP store.
pub struct KvNamespace<E: Executor> {
    executor: Arc<E>,
}

impl<E: Executor> Clone for KvNamespace<E> {
    fn clone(&self) -> Self {
        KvNamespace {
            executor: Arc::clone(&self.executor),
        }
    }
}

impl<E: Executor> KvNamespace<E> {
    /// Takes ownership of a store handle.
    pub fn new(executor: E) -> Self {
        Self::from_shared(Arc::new(executor))
    }

    /// Shares an existing store handle.
    pub fn from_shared(executor: Arc<E>) -> Self {
        KvNamespace { executor }
    }

    /// The underlying store handle.
    pub fn executor(&self) -> &Arc<E> {
        &self.executor
    }

    /// Writes `value` under `key`.
    ///
    /// Returns `Ok(false)` without touching the store when `options.expiration`
    /// is not in the future; otherwise returns whether the store acknowledged
    /// the write with `OK`.
    pub async fn put(&self, key: &str, value: impl Into<Bytes>, options: PutOptions) -> EkvResult<bool> {
        let command = Command::new("SET").arg(key).arg_bytes(value.into());
        let command = match options.plan(epoch_secs())? {
            ExpiryPlan::Persistent => command,
            ExpiryPlan::ExpiresIn(secs) => command.arg("EX").arg(secs.to_string()),
            ExpiryPlan::AlreadyExpired => {
                tracing::debug!(key, expiration = ?options.expiration, "expiration is in the past, skipping write");
                return Ok(false);
            }
        };

        let reply = self.executor.call(command).await?;
        Ok(reply.is_ok())
    }

    /// Reads `key` and coerces it to `kind`. A missing key is `Ok(None)`.
    pub async fn get(&self, key: &str, kind: ValueKind) -> EkvResult<Option<KvValue>> {
        let reply = self.executor.call(Command::new("GET").arg(key)).await?;
        reply
            .into_optional_bytes()?
            .map(|raw| KvValue::materialize(raw, kind))
            .transpose()
    }

    /// Like `get`, with the kind given by name (`"text"`, `"arrayBuffer"`,
    /// `"json"`, `"stream"`). Unknown names fail before any store call.
    pub async fn get_with_type(&self, key: &str, type_name: &str) -> EkvResult<Option<KvValue>> {
        let kind: ValueKind = type_name.parse()?;
        self.get(key, kind).await
    }

    /// Reads `key` and deserializes it from JSON into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> EkvResult<Option<T>> {
        let reply = self.executor.call(Command::new("GET").arg(key)).await?;
        match reply.into_optional_bytes()? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Lists one page of keys with their TTLs resolved.
    ///
    /// TTL lookups for the page run concurrently and are awaited before the
    /// page is returned; if any of them fails the whole call fails.
    pub async fn list(&self, options: ListOptions) -> EkvResult<ListPage<KeyInfo>> {
        let (cursor, names) = self.scan(&options).await?;
        let ttls = try_join_all(names.iter().map(|name| self.get_ttl(name))).await?;
        let now = epoch_secs();
        let keys = names
            .into_iter()
            .zip(ttls)
            .map(|(name, ttl)| KeyInfo::new(name, ttl, now))
            .collect();
        Ok(ListPage::new(keys, cursor))
    }

    /// Lists one page of keys without waiting for their TTLs.
    ///
    /// Each key carries a spawned lookup the caller may await on its own. A
    /// failing lookup only affects its own key. Must be called from within a
    /// Tokio runtime.
    pub async fn list_pending(&self, options: ListOptions) -> EkvResult<ListPage<PendingKey>> {
        let (cursor, names) = self.scan(&options).await?;
        let keys = names
            .into_iter()
            .map(|name| {
                let executor = Arc::clone(&self.executor);
                let key = name.clone();
                let ttl = TtlLookup::spawn(async move { ttl_of(executor.as_ref(), &key).await });
                PendingKey { name, ttl }
            })
            .collect();
        Ok(ListPage::new(keys, cursor))
    }

    /// Walks every page under `prefix` and returns the distinct key names, sorted.
    ///
    /// Keys written or deleted during the walk may or may not be included.
    pub async fn list_all(&self, prefix: &str) -> EkvResult<Vec<String>> {
        let mut seen = BTreeSet::new();
        let mut options = ListOptions::default().with_prefix(prefix);
        loop {
            let (cursor, names) = self.scan(&options).await?;
            seen.extend(names);
            if cursor == crate::listing::CURSOR_START {
                return Ok(seen.into_iter().collect());
            }
            options.cursor = Some(cursor);
        }
    }

    /// Returns the store-native TTL reply for `key` (`-1` no expiry, `-2` missing).
    pub async fn get_ttl(&self, key: &str) -> EkvResult<i64> {
        ttl_of(self.executor.as_ref(), key).await
    }

    /// Deletes `key`, failing with `NotFound` if the store did not have it.
    pub async fn delete(&self, key: &str) -> EkvResult<()> {
        let removed = self
            .executor
            .call(Command::new("DEL").arg(key))
            .await?
            .into_integer()?;
        if removed == 0 {
            return Err(EkvError::NotFound(key.to_string()));
        }
        Ok(())
    }

    /// Liveness check; returns the store's token (`PONG`).
    pub async fn ping(&self) -> EkvResult<String> {
        self.executor.call(Command::new("PING")).await?.into_text()
    }

    async fn scan(&self, options: &ListOptions) -> EkvResult<(String, Vec<String>)> {
        let reply = self.executor.call(options.scan_command()).await?;
        parse_scan_reply(reply)
    }
}

async fn ttl_of<E: Executor + ?Sized>(executor: &E, key: &str) -> EkvResult<i64> {
    executor.call(Command::new("TTL").arg(key)).await?.into_integer()
}
