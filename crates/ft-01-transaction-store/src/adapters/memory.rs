//! # In-Memory Transaction Store
//!
//! Default backend and test double. Supports failure injection so the
//! consumer's retry and dead-letter paths can be exercised.

use crate::domain::{paginate, Page, StoreError, TransactionFilter};
use crate::ports::TransactionStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{Transaction, TransactionId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Default)]
struct Faults {
    /// Upserts left to fail before succeeding again.
    fail_upserts: AtomicU32,
    /// Every query fails while set.
    fail_queries: AtomicBool,
    /// Artificial latency added to upserts.
    upsert_delay_ms: AtomicU64,
    /// Artificial latency added to queries.
    query_delay_ms: AtomicU64,
}

/// Thread-safe in-memory store keyed by transaction id.
#[derive(Clone, Default)]
pub struct InMemoryTransactionStore {
    rows: Arc<RwLock<HashMap<TransactionId, Transaction>>>,
    faults: Arc<Faults>,
    closed: Arc<AtomicBool>,
    upsert_calls: Arc<AtomicU64>,
    query_calls: Arc<AtomicU64>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Upsert attempts so far, including failed ones.
    pub fn upsert_calls(&self) -> u64 {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Query attempts so far, including failed ones.
    pub fn query_calls(&self) -> u64 {
        self.query_calls.load(Ordering::SeqCst)
    }

    /// Fail the next `count` upserts with `StoreError::Unavailable`.
    pub fn fail_next_upserts(&self, count: u32) {
        self.faults.fail_upserts.store(count, Ordering::SeqCst);
    }

    /// Toggle failure of every query.
    pub fn set_query_failure(&self, failing: bool) {
        self.faults.fail_queries.store(failing, Ordering::SeqCst);
    }

    pub fn set_upsert_delay(&self, delay: Duration) {
        self.faults
            .upsert_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_query_delay(&self, delay: Duration) {
        self.faults
            .query_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    async fn delay(millis: &AtomicU64) {
        let ms = millis.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn upsert(&self, tx: &Transaction) -> Result<(), StoreError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_open()?;
        Self::delay(&self.faults.upsert_delay_ms).await;

        let injected = self
            .faults
            .fail_upserts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable("injected upsert failure".into()));
        }

        let replaced = self.rows.write().insert(tx.id.clone(), tx.clone()).is_some();
        debug!(id = %tx.id, replaced, "Transaction upserted");
        Ok(())
    }

    async fn query(
        &self,
        filter: &TransactionFilter,
        page: Option<Page>,
    ) -> Result<Vec<Transaction>, StoreError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_open()?;
        Self::delay(&self.faults.query_delay_ms).await;

        if self.faults.fail_queries.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected query failure".into()));
        }

        let matches: Vec<Transaction> = self
            .rows
            .read()
            .values()
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect();
        Ok(paginate(matches, page))
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Transaction>, StoreError> {
        self.ensure_open()?;
        Ok(self.rows.read().get(id).cloned())
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        match self.rows.write().remove(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound { id: id.to_string() }),
        }
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
