//! # Shared Types Crate
//!
//! This crate contains the domain entities and intake invariants shared by
//! every component of the ingestion pipeline and the report engine.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: The `Transaction` schema is identical on the
//!   HTTP surface, on the queue and in the store.
//! - **Defense in Depth**: `TransactionValidator` is run by both the gateway
//!   and the consumer.

pub mod entities;
pub mod errors;
pub mod validation;

pub use entities::*;
pub use errors::*;
pub use validation::*;
