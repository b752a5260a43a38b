//! # Report Engine (ft-05)
//!
//! `generate(user_id, report_type, start, end) -> Report`, cache-aside over
//! the transaction store.
//!
//! ## Guarantees
//!
//! | Property | Mechanism |
//! |----------|-----------|
//! | One store computation per key at a time | per-key async mutex + re-check |
//! | Cache is an optimization only | every `CacheError` is a miss |
//! | Caller can abort | `CancellationToken`, `query_timeout` |
//! | Bounded staleness | entries expire after 24h; never invalidated by ingestion |

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod service;

pub use domain::{ReportError, ReportRequest};
pub use service::{EngineStats, ReportEngine, ReportEngineConfig};
pub use tokio_util::sync::CancellationToken;
