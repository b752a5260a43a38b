//! # HTTP API (ft-06)
//!
//! Thin translation layer between HTTP and the pipeline components. Holds
//! no business rules beyond parameter parsing.
//!
//! ```text
//! POST /transactions ──→ IngestionGateway ──→ Queue
//! POST /import       ──→ IngestionGateway ──→ Queue
//! GET  /transactions ──→ TransactionStore
//! GET  /reports      ──→ ReportEngine ──→ Cache | Store
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod handlers;
pub mod params;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::{build_router, serve, HttpConfig};
pub use state::AppState;
