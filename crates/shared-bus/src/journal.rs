//! # Message Journal
//!
//! Persistence hook for the queue. The queue keeps its ready and in-flight
//! index in memory; a journal mirrors every message it holds so the index
//! can be rebuilt after a restart.
//!
//! ```text
//! publish()      → append(topic, id, payload)
//! delivered      → record_delivery(topic, id, count)   (manual ack)
//! ack / discard  → remove(topic, id)
//! startup        → recover() → ready again, counts intact
//! ```

use crate::publisher::TransportError;

/// A message read back from a journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournaledMessage {
    pub topic: String,
    /// Monotonic per-queue identifier; recovery replays in id order.
    pub id: u64,
    pub payload: Vec<u8>,
    /// Deliveries already made before the restart.
    pub delivery_count: u32,
}

/// Durable record of the messages a queue still owes its subscribers.
///
/// Calls are synchronous; transports that journal to disk run publishes on
/// the blocking pool.
pub trait MessageJournal: Send + Sync {
    /// Record a newly published message.
    fn append(&self, topic: &str, id: u64, payload: &[u8]) -> Result<(), TransportError>;

    /// Record that a message was handed out `delivery_count` times.
    fn record_delivery(&self, topic: &str, id: u64, delivery_count: u32)
        -> Result<(), TransportError>;

    /// Forget a settled message.
    fn remove(&self, topic: &str, id: u64) -> Result<(), TransportError>;

    /// Every message still held, in any order.
    fn recover(&self) -> Result<Vec<JournaledMessage>, TransportError>;
}
