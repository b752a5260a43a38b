//! # Domain Errors
//!
//! Error types for the Transaction Store.

use shared_types::TransactionId;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No record with this id exists.
    #[error("transaction not found: {id}")]
    NotFound { id: TransactionId },

    /// Pagination parameters were not positive integers.
    #[error("invalid page: page={page}, page_size={page_size} (both must be positive)")]
    InvalidPage { page: i64, page_size: i64 },

    /// Backend unreachable or failed the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The store has been closed.
    #[error("store closed")]
    Closed,
}

impl StoreError {
    /// Caller errors are resolved at the boundary and never retried.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::InvalidPage { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
