//! # In-Memory Report Cache
//!
//! Expiry is measured on the tokio clock so tests can advance time with
//! `tokio::time::pause()` / `advance()`.

use crate::errors::CacheError;
use crate::ports::ReportCache;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Default)]
struct Counters {
    gets: AtomicU64,
    hits: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
}

/// Test double and single-process cache.
#[derive(Clone, Default)]
pub struct InMemoryReportCache {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    counters: Arc<Counters>,
    fail_gets: Arc<AtomicBool>,
    fail_sets: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl InMemoryReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_calls(&self) -> u64 {
        self.counters.gets.load(Ordering::SeqCst)
    }

    pub fn hits(&self) -> u64 {
        self.counters.hits.load(Ordering::SeqCst)
    }

    pub fn set_calls(&self) -> u64 {
        self.counters.sets.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> u64 {
        self.counters.deletes.load(Ordering::SeqCst)
    }

    /// Make every `get` fail while set.
    pub fn set_get_failure(&self, failing: bool) {
        self.fail_gets.store(failing, Ordering::SeqCst);
    }

    /// Make every `set` fail while set.
    pub fn set_set_failure(&self, failing: bool) {
        self.fail_sets.store(failing, Ordering::SeqCst);
    }

    /// Store a raw value directly, bypassing counters.
    pub fn seed(&self, key: &str, value: impl Into<String>, ttl: Duration) {
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value: value.into(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Live value for `key`, bypassing counters.
    pub fn peek(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.entries
            .lock()
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.value.clone())
    }

    fn ensure_open(&self) -> Result<(), CacheError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CacheError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl ReportCache for InMemoryReportCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.counters.gets.fetch_add(1, Ordering::SeqCst);
        self.ensure_open()?;
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("injected get failure".into()));
        }

        let now = Instant::now();
        let mut entries = self.entries.lock();
        let value = match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        };
        if value.is_some() {
            self.counters.hits.fetch_add(1, Ordering::SeqCst);
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.counters.sets.fetch_add(1, Ordering::SeqCst);
        self.ensure_open()?;
        if self.fail_sets.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("injected set failure".into()));
        }
        self.seed(key, value, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.counters.deletes.fetch_add(1, Ordering::SeqCst);
        self.ensure_open()?;
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn close(&self) -> Result<(), CacheError> {
        self.closed.store(true, Ordering::SeqCst);
        self.entries.lock().clear();
        Ok(())
    }
}
