//! # Transaction Consumer (ft-04)
//!
//! Finalizes transactions: decode, re-validate, mark reconciled, upsert,
//! then acknowledge.
//!
//! ## Acknowledgment Discipline
//!
//! | Situation | Settlement |
//! |-----------|------------|
//! | Persisted | `ack` |
//! | Undecodable / invalid | `ack` (dropped, logged) |
//! | Persist failed, budget left | wait `retry_backoff`, `nack(requeue)` |
//! | Persist failed, budget spent | publish to `{topic}.dlq`, then `ack` |
//! | Dead-letter publish failed | `nack(requeue)` |
//!
//! Nothing is acknowledged before its side effect is durable. Redelivery is
//! safe because persistence is an idempotent upsert by id.
//!
//! ## Concurrency
//!
//! One task drains the subscription and handles messages sequentially, so
//! per-consumer ordering is preserved.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod service;

pub use domain::{ConsumerError, ConsumerStats, Outcome, StatsSnapshot};
pub use service::{ConsumerConfig, TransactionConsumer};
