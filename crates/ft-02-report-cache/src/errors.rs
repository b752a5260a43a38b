//! # Cache Errors

use thiserror::Error;

/// Errors from cache operations. Always non-fatal to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Backend unreachable or failed the operation.
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// The cache has been closed.
    #[error("cache closed")]
    Closed,
}
