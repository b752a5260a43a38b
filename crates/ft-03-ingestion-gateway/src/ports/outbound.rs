//! # Outbound Ports (Driven Ports)

use shared_types::Transaction;

/// Turns a raw bank or credit card statement into candidate transactions.
///
/// The returned candidates are not yet validated.
pub trait StatementParser: Send + Sync {
    /// # Errors
    ///
    /// A human-readable description of why the statement is unreadable.
    fn parse(&self, statement: &[u8]) -> Result<Vec<Transaction>, String>;
}
