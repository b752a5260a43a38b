//! # Domain Errors

use shared_bus::TransportError;
use thiserror::Error;

/// Errors that stop the consumer loop. Per-message failures never do.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsumerError {
    #[error("failed to subscribe to {topic}: {source}")]
    Subscribe {
        topic: String,
        source: TransportError,
    },
}
