//! # Outbound Ports (Driven Ports)
//!
//! Storage capability consumed by the Transaction Consumer (writes) and the
//! Report Engine and HTTP query path (reads).

use crate::domain::{Page, StoreError, TransactionFilter};
use async_trait::async_trait;
use shared_types::Transaction;

/// Durable keyed storage for transactions.
///
/// Implementations must be safe for concurrent use from many tasks.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert or replace the record with `tx.id`.
    ///
    /// Applying the same record twice leaves the same final state; a
    /// redelivered message is a no-op rather than a duplicate or an error.
    async fn upsert(&self, tx: &Transaction) -> Result<(), StoreError>;

    /// Records matching `filter`, ordered by date then id.
    ///
    /// `page = None` returns every match.
    async fn query(
        &self,
        filter: &TransactionFilter,
        page: Option<Page>,
    ) -> Result<Vec<Transaction>, StoreError>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Transaction>, StoreError>;

    /// Remove a record.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` when no record has this id.
    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError>;

    /// Release backend resources. Subsequent calls fail with `Closed`.
    async fn close(&self) -> Result<(), StoreError>;
}
