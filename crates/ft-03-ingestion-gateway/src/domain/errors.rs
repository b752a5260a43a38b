//! # Domain Errors

use shared_bus::TransportError;
use shared_types::ValidationError;
use thiserror::Error;

/// Errors surfaced by the ingestion gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    /// The candidate violates an intake invariant. Nothing was published.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A statement entry violates an intake invariant. Nothing was published.
    #[error("statement entry {index} invalid: {source}")]
    InvalidEntry {
        index: usize,
        source: ValidationError,
    },

    /// The statement could not be parsed.
    #[error("import failed: {0}")]
    Import(String),

    /// The envelope could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The transport kept failing after the retry budget was spent.
    #[error("publish failed after {attempts} attempt(s): {source}")]
    Publish {
        attempts: u32,
        source: TransportError,
    },
}

impl IngestError {
    /// Client-caused errors map to 400, the rest to 500.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::InvalidEntry { .. } | Self::Import(_)
        )
    }
}
