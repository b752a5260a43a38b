//! # Report Cache (ft-02)
//!
//! TTL key-value cache holding serialized reports.
//!
//! Cache failures are never fatal: the Report Engine treats any
//! `CacheError` as a miss and computes from the store.
//!
//! | Adapter | Clock | Use |
//! |---------|-------|-----|
//! | `InMemoryReportCache` | tokio | tests, single process |
//! | `MokaReportCache` | std | production |

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod errors;
pub mod ports;

pub use adapters::{InMemoryReportCache, MokaReportCache, DEFAULT_CACHE_CAPACITY};
pub use errors::CacheError;
pub use ports::ReportCache;

/// Lifetime of a cached report.
pub const REPORT_TTL: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);
