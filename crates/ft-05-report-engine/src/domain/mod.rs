//! # Domain Layer

pub mod errors;
pub mod request;

pub use errors::ReportError;
pub use request::ReportRequest;
