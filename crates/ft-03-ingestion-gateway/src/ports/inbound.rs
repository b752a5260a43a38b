//! # Inbound Ports (Driving Ports)

use crate::domain::IngestError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_types::{Transaction, TransactionId};

/// Acknowledgment that a transaction was accepted for asynchronous
/// processing. Says nothing about durability; poll the query path to
/// observe the final state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accepted {
    pub id: TransactionId,
}

/// Intake API consumed by the HTTP layer.
#[async_trait]
pub trait TransactionIntake: Send + Sync {
    /// Validate and enqueue one candidate.
    async fn submit(&self, candidate: Transaction) -> Result<Accepted, IngestError>;

    /// Parse a statement, validate every entry, then enqueue each.
    async fn import(&self, statement: &[u8]) -> Result<Vec<Accepted>, IngestError>;
}
