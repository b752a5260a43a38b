//! # Message Outcomes
//!
//! ```text
//! Received → Validating ─┬─ Valid → Persisting ─┬─ Committed (ack)
//!                        │                      └─ PersistFailed ─┬─ Retried (nack+requeue)
//!                        │                                        ├─ DeadLettered (dlq, ack)
//!                        │                                        └─ Lost (auto-ack, dlq and
//!                        │                                           republish both failed)
//!                        └─ Invalid → Dropped (logged, ack)
//! ```

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Terminal state of handling one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Persisted and acknowledged.
    Committed,
    /// Undecodable or invalid; logged and acknowledged.
    Dropped,
    /// Persistence failed; requeued for another attempt.
    Retried,
    /// Retry budget exhausted; routed to the dead-letter topic.
    DeadLettered,
    /// Already auto-acknowledged and neither the dead-letter topic nor the
    /// source topic accepted it; only the error log keeps the payload.
    Lost,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Committed => write!(f, "committed"),
            Self::Dropped => write!(f, "dropped"),
            Self::Retried => write!(f, "retried"),
            Self::DeadLettered => write!(f, "dead_lettered"),
            Self::Lost => write!(f, "lost"),
        }
    }
}

/// Running totals per outcome.
#[derive(Debug, Default)]
pub struct ConsumerStats {
    committed: AtomicU64,
    dropped: AtomicU64,
    retried: AtomicU64,
    dead_lettered: AtomicU64,
    lost: AtomicU64,
}

/// Point-in-time copy of `ConsumerStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub committed: u64,
    pub dropped: u64,
    pub retried: u64,
    pub dead_lettered: u64,
    pub lost: u64,
}

impl ConsumerStats {
    pub fn record(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Committed => &self.committed,
            Outcome::Dropped => &self.dropped,
            Outcome::Retried => &self.retried,
            Outcome::DeadLettered => &self.dead_lettered,
            Outcome::Lost => &self.lost,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            committed: self.committed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            lost: self.lost.load(Ordering::Relaxed),
        }
    }
}
