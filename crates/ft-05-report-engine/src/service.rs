//! # Report Engine Service
//!
//! Cache-aside reads with at-most-one concurrent computation per cache key.
//!
//! ```text
//! generate() → cache.get ─ hit ─────────────────────────────→ Report
//!                  │
//!                  miss → lock(key) → cache.get ─ hit ──────→ Report
//!                                        │
//!                                        miss → store.query → cache.set → Report
//! ```
//!
//! The per-key lock is the only lock held across I/O. Unrelated keys never
//! contend.

use crate::domain::{ReportError, ReportRequest};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ft_01_transaction_store::TransactionStore;
use ft_02_report_cache::{ReportCache, REPORT_TTL};
use shared_types::Report;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Report engine configuration.
#[derive(Debug, Clone)]
pub struct ReportEngineConfig {
    /// Lifetime of a cached report.
    pub ttl: Duration,
    /// Bound on one store query.
    pub query_timeout: Duration,
}

impl Default for ReportEngineConfig {
    fn default() -> Self {
        Self {
            ttl: REPORT_TTL,
            query_timeout: Duration::from_secs(30),
        }
    }
}

/// Counters for cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub hits: u64,
    pub misses: u64,
    /// Store queries actually issued.
    pub computations: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    computations: AtomicU64,
}

/// Per-key lock plus the number of callers holding or waiting on it.
#[derive(Default)]
struct FlightSlot {
    lock: Arc<Mutex<()>>,
    members: usize,
}

type FlightMap = DashMap<String, FlightSlot>;

/// Membership in the per-key lock map. The last member to leave removes the
/// entry, including when the request future is cancelled.
struct Flight<'a> {
    map: &'a FlightMap,
    key: String,
    lock: Arc<Mutex<()>>,
}

impl<'a> Flight<'a> {
    fn join(map: &'a FlightMap, key: &str) -> Self {
        let mut slot = map.entry(key.to_string()).or_default();
        slot.members += 1;
        let lock = Arc::clone(&slot.lock);
        drop(slot);
        Self {
            map,
            key: key.to_string(),
            lock,
        }
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if let Entry::Occupied(mut entry) = self.map.entry(self.key.clone()) {
            let slot = entry.get_mut();
            slot.members = slot.members.saturating_sub(1);
            if slot.members == 0 {
                entry.remove();
            }
        }
    }
}

/// Generates reports from the store, caching them for `ttl`.
pub struct ReportEngine {
    store: Arc<dyn TransactionStore>,
    cache: Arc<dyn ReportCache>,
    config: ReportEngineConfig,
    flights: FlightMap,
    counters: Counters,
}

impl ReportEngine {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        cache: Arc<dyn ReportCache>,
        config: ReportEngineConfig,
    ) -> Self {
        Self {
            store,
            cache,
            config,
            flights: DashMap::new(),
            counters: Counters::default(),
        }
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            computations: self.counters.computations.load(Ordering::Relaxed),
        }
    }

    /// Keys with a computation in progress or queued.
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    /// Produce the report for `request`.
    ///
    /// Cache failures are logged and bypassed. Cancelling `cancel` aborts
    /// the store query and releases the key lock.
    #[instrument(skip(self, cancel), fields(user_id = %request.user_id, report_type = %request.report_type))]
    pub async fn generate(
        &self,
        request: &ReportRequest,
        cancel: &CancellationToken,
    ) -> Result<Report, ReportError> {
        if request.user_id.trim().is_empty() {
            return Err(ReportError::InvalidRequest("user_id is required".into()));
        }
        if let (Some(start), Some(end)) = (request.start, request.end) {
            if start > end {
                return Err(ReportError::InvalidRequest(format!(
                    "start date {start} is after end date {end}"
                )));
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Report request cancelled");
                Err(ReportError::Cancelled)
            }
            result = self.generate_uncancelled(request) => result,
        }
    }

    async fn generate_uncancelled(&self, request: &ReportRequest) -> Result<Report, ReportError> {
        let cache_key = request.key().cache_key();

        if let Some(report) = self.lookup(&cache_key).await {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(report);
        }

        let flight = Flight::join(&self.flights, &cache_key);
        let _guard = flight.lock.lock().await;

        // Another caller may have filled the cache while we waited.
        if let Some(report) = self.lookup(&cache_key).await {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(report);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let report = self.compute(request).await?;
        self.populate(&cache_key, &report).await;
        Ok(report)
    }

    /// Cached report, or `None` on miss, cache error or undecodable value.
    async fn lookup(&self, cache_key: &str) -> Option<Report> {
        match self.cache.get(cache_key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(key = cache_key, error = %e, "Undecodable cached report, recomputing");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = cache_key, error = %e, "Cache read failed, computing from store");
                None
            }
        }
    }

    async fn compute(&self, request: &ReportRequest) -> Result<Report, ReportError> {
        self.counters.computations.fetch_add(1, Ordering::Relaxed);
        let filter = request.filter();

        let entries = tokio::time::timeout(self.config.query_timeout, self.store.query(&filter, None))
            .await
            .map_err(|_| ReportError::Timeout(self.config.query_timeout))??;

        let report = Report::assemble(&request.key(), entries, Utc::now());
        info!(entries = report.totals.count, net = %report.totals.net, "Report computed");
        Ok(report)
    }

    async fn populate(&self, cache_key: &str, report: &Report) {
        let raw = match serde_json::to_string(report) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = cache_key, error = %e, "Failed to encode report for cache");
                return;
            }
        };
        if let Err(e) = self.cache.set(cache_key, raw, self.config.ttl).await {
            warn!(key = cache_key, error = %e, "Cache write failed, serving uncached report");
        }
    }

    /// Drop the cached report for `request`. Ingestion never calls this;
    /// reports go stale for at most `ttl`.
    pub async fn invalidate(&self, request: &ReportRequest) {
        let cache_key = request.key().cache_key();
        if let Err(e) = self.cache.delete(&cache_key).await {
            warn!(key = %cache_key, error = %e, "Cache delete failed");
        }
    }
}
