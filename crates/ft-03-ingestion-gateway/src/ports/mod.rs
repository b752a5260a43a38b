//! # Ports Layer
//!
//! - **Inbound** (`inbound.rs`): the intake API driven by the HTTP surface
//! - **Outbound** (`outbound.rs`): statement parsing

pub mod inbound;
pub mod outbound;

pub use inbound::{Accepted, TransactionIntake};
pub use outbound::StatementParser;
