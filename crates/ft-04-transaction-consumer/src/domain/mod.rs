//! # Domain Layer
//!
//! Per-message state machine vocabulary and counters.

pub mod errors;
pub mod outcome;

pub use errors::ConsumerError;
pub use outcome::{ConsumerStats, Outcome, StatsSnapshot};
