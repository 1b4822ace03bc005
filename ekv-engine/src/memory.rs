//! # In-Memory Engine
//!
//! A process-local store with Redis key semantics, used as the development
//! backing store and in tests.
//!
//! ## Notes
//! - Expired entries are hidden from reads immediately and physically removed
//!   by writes to the same key or by the background expirer.
//! - `scan` walks the key space in sorted order. The cursor is the offset of
//!   the next key to visit, so keys inserted or removed behind the cursor
//!   shift positions: like the real store, a concurrently mutated key may be
//!   skipped or returned twice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use ahash::RandomState;
use bytes::Bytes;
use hashbrown::HashMap;
use parking_lot::RwLock;

use ekv_common::{EkvError, EkvResult, TtlStatus, glob_match};

use crate::engine::{KVEngine, ScanPage, SetCondition, SetOptions};

#[derive(Debug, Clone)]
struct Entry {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Thread-safe in-memory engine.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    entries: RwLock<HashMap<Vec<u8>, Entry, RandomState>>,
}

impl MemoryEngine {
    /// Creates an empty engine.
    pub fn new() -> Self {
        MemoryEngine {
            entries: RwLock::new(HashMap::with_hasher(RandomState::new())),
        }
    }

    /// Removes every expired entry. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Starts a background thread that purges expired entries every `interval`.
    ///
    /// The thread holds a weak reference, so it exits on its own once the
    /// engine is dropped. Dropping the handle also stops it.
    pub fn start_expirer(self: &Arc<Self>, interval: Duration) -> ExpirerHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let engine: Weak<MemoryEngine> = Arc::downgrade(self);
        let flag = Arc::clone(&stop);
        let thread = std::thread::Builder::new()
            .name("ekv-expirer".into())
            .spawn(move || {
                while !flag.load(Ordering::Acquire) {
                    std::thread::park_timeout(interval);
                    if flag.load(Ordering::Acquire) {
                        break;
                    }
                    let Some(engine) = engine.upgrade() else {
                        break;
                    };
                    let purged = engine.purge_expired();
                    if purged > 0 {
                        tracing::trace!(purged, "expired keys removed");
                    }
                }
            });

        match thread {
            Ok(thread) => ExpirerHandle {
                stop,
                thread: Some(thread),
            },
            Err(err) => {
                // Reads still hide expired keys, so losing active expiry only costs memory.
                tracing::warn!(error = %err, "failed to start expirer thread");
                ExpirerHandle { stop, thread: None }
            }
        }
    }

    fn live_sorted_keys(&self) -> Vec<Vec<u8>> {
        let now = Instant::now();
        let entries = self.entries.read();
        let mut keys: Vec<Vec<u8>> = entries
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort_unstable();
        keys
    }
}

impl KVEngine for MemoryEngine {
    fn get(&self, key: &[u8]) -> EkvResult<Option<Bytes>> {
        let now = Instant::now();
        let entries = self.entries.read();
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    fn set(&self, key: Vec<u8>, value: Bytes, options: SetOptions) -> EkvResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let present = entries.get(&key).is_some_and(|entry| entry.is_live(now));
        let allowed = match options.condition {
            SetCondition::Always => true,
            SetCondition::IfAbsent => !present,
            SetCondition::IfPresent => present,
        };
        if !allowed {
            return Ok(false);
        }
        let expires_at = options.ttl.map(|ttl| deadline(now, ttl)).transpose()?;
        entries.insert(key, Entry { value, expires_at });
        Ok(true)
    }

    fn delete(&self, key: &[u8]) -> EkvResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.write();
        Ok(entries.remove(key).is_some_and(|entry| entry.is_live(now)))
    }

    fn exists(&self, key: &[u8]) -> EkvResult<bool> {
        let now = Instant::now();
        let entries = self.entries.read();
        Ok(entries.get(key).is_some_and(|entry| entry.is_live(now)))
    }

    fn expire(&self, key: &[u8], ttl: Duration) -> EkvResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.write();
        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                entry.expires_at = Some(deadline(now, ttl)?);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn ttl(&self, key: &[u8]) -> EkvResult<TtlStatus> {
        let now = Instant::now();
        let entries = self.entries.read();
        Ok(match entries.get(key) {
            Some(entry) if entry.is_live(now) => match entry.expires_at {
                None => TtlStatus::NoExpiry,
                Some(at) => TtlStatus::ExpiresIn(at - now),
            },
            _ => TtlStatus::Missing,
        })
    }

    fn scan(&self, cursor: u64, pattern: Option<&[u8]>, count: usize) -> EkvResult<ScanPage> {
        let keys = self.live_sorted_keys();
        let start = usize::try_from(cursor).unwrap_or(usize::MAX).min(keys.len());
        let end = start.saturating_add(count.max(1)).min(keys.len());
        let next_cursor = if end >= keys.len() { 0 } else { end as u64 };
        let keys = keys
            .into_iter()
            .skip(start)
            .take(end - start)
            .filter(|key| pattern.is_none_or(|p| glob_match(p, key)))
            .collect();
        Ok(ScanPage { next_cursor, keys })
    }

    fn keys(&self, pattern: &[u8]) -> EkvResult<Vec<Vec<u8>>> {
        Ok(self
            .live_sorted_keys()
            .into_iter()
            .filter(|key| glob_match(pattern, key))
            .collect())
    }

    fn len(&self) -> EkvResult<usize> {
        let now = Instant::now();
        let entries = self.entries.read();
        Ok(entries.values().filter(|entry| entry.is_live(now)).count())
    }

    fn clear(&self) -> EkvResult<()> {
        self.entries.write().clear();
        Ok(())
    }
}

/// `now + ttl`, or `InvalidArgument` when the instant is not representable.
fn deadline(now: Instant, ttl: Duration) -> EkvResult<Instant> {
    now.checked_add(ttl)
        .ok_or_else(|| EkvError::invalid(format!("expire time of {}s is out of range", ttl.as_secs())))
}

/// Handle to the background expirer thread.
#[derive(Debug)]
pub struct ExpirerHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ExpirerHandle {
    /// Stops the expirer and waits for the thread to exit.
    pub fn stop(mut self) {
        self.signal();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    fn signal(&self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = &self.thread {
            thread.thread().unpark();
        }
    }
}

impl Drop for ExpirerHandle {
    fn drop(&mut self) {
        self.signal();
    }
}
