//! # Transaction Store (ft-01)
//!
//! Durable keyed storage for transactions with filtered range queries.
//!
//! ## Ownership
//!
//! The store is written only by the Transaction Consumer. The Ingestion
//! Gateway never writes here; the Report Engine and the HTTP query path
//! only read.
//!
//! ```text
//! Consumer ──upsert()──→ [TransactionStore] ←──query()── Report Engine / HTTP
//! ```
//!
//! ## Contract
//!
//! | Operation | Guarantee |
//! |-----------|-----------|
//! | `upsert` | Idempotent by `id` |
//! | `query` | Conjunctive filter, ordered by `(date, id)`, offset pagination |
//! | `delete_by_id` | `NotFound` for unknown ids |
//!
//! ## Hexagonal Architecture
//!
//! - **Domain Layer** (`domain/`): filter, pagination, ordering, errors
//! - **Ports Layer** (`ports/`): the `TransactionStore` capability
//! - **Adapters Layer** (`adapters/`): in-memory and RocksDB backends

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::InMemoryTransactionStore;
#[cfg(feature = "rocksdb")]
pub use adapters::{RocksDbStoreConfig, RocksDbTransactionStore};
pub use domain::{end_of_day, start_of_day, Page, StoreError, TransactionFilter};
pub use ports::TransactionStore;
