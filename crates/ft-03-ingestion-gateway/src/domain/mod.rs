//! # Domain Layer

pub mod errors;
pub mod retry;

pub use errors::IngestError;
pub use retry::RetryPolicy;
