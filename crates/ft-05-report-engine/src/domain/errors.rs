//! # Domain Errors

use ft_01_transaction_store::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Errors from report generation. Cache failures never appear here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("invalid report request: {0}")]
    InvalidRequest(String),

    #[error("store query failed: {0}")]
    Store(#[from] StoreError),

    /// The caller went away.
    #[error("report generation cancelled")]
    Cancelled,

    #[error("store query timed out after {0:?}")]
    Timeout(Duration),
}
