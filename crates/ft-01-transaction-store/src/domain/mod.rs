//! # Domain Layer
//!
//! Pure query logic. No I/O.

pub mod errors;
pub mod query;

pub use errors::StoreError;
pub use query::{canonical_order, end_of_day, paginate, start_of_day, Page, TransactionFilter};
