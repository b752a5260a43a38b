//! # Adapters Layer
//!
//! - `memory`: tokio-clock TTL map with counters and failure injection
//! - `moka_cache`: production adapter with per-entry expiry

pub mod memory;
pub mod moka_cache;

pub use memory::InMemoryReportCache;
pub use moka_cache::{MokaReportCache, DEFAULT_CACHE_CAPACITY};
