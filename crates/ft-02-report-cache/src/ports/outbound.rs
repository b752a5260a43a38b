//! # Outbound Ports (Driven Ports)

use crate::errors::CacheError;
use async_trait::async_trait;
use std::time::Duration;

/// TTL key-value cache over opaque string values.
///
/// Values are treated as black boxes; the cache never inspects them.
#[async_trait]
pub trait ReportCache: Send + Sync {
    /// Fetch a live value. Expired entries read as `None`.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key`, replacing any previous value, for `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Release backend resources. Subsequent calls fail with `Closed`.
    async fn close(&self) -> Result<(), CacheError>;
}
