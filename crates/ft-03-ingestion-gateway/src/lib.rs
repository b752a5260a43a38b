//! # Ingestion Gateway (ft-03)
//!
//! Asynchronous write path: accept, validate, publish, respond.
//!
//! ```text
//! HTTP ──submit()──→ [Validate] ──→ [Assign id] ──→ [Publish w/ retry] ──→ Queue
//!                        │
//!                        └── invalid → 400, nothing published
//! ```
//!
//! ## Guarantees
//!
//! - Validation failures have no side effect.
//! - One accepted transaction is exactly one enqueued message.
//! - Transient transport failures are retried with exponential backoff;
//!   the error is surfaced once the budget is spent.
//! - Statement import validates every entry before publishing any.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::JsonStatementParser;
pub use domain::{IngestError, RetryPolicy};
pub use ports::{Accepted, StatementParser, TransactionIntake};
pub use service::{GatewayConfig, IngestionGateway};
