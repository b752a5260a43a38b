//! # Shared Bus - Durable Queue Transport
//!
//! Carries transaction envelopes from the ingestion gateway to the
//! transaction consumer.
//!
//! ## Delivery Contract
//!
//! - **At-least-once:** every published payload reaches at least one
//!   subscriber; a delivery that is neither acked nor nacked is redelivered.
//! - **Manual acknowledgment:** consumers ack only after the side effect is
//!   durable. `AckMode::Auto` acknowledges on delivery and degrades the
//!   guarantee to at-most-once.
//! - **Dead Letter Queue:** messages that exhaust their retry budget are
//!   published to `"{topic}.dlq"` for manual inspection. Dead-letter topics
//!   have their own capacity.
//! - **Durability:** `InMemoryQueue` alone loses ready messages on restart.
//!   With the `rocksdb` feature, `RocksDbQueue` journals every message until
//!   it is settled and replays the journal on startup.
//!
//! ```text
//! ┌──────────────┐   publish()   ┌──────────────┐  next()/ack()  ┌──────────────┐
//! │   Gateway    │ ────────────→ │    Queue     │ ─────────────→ │   Consumer   │
//! └──────────────┘               │ ready/flight │ ←── nack() ─── └──────────────┘
//!                                └──────────────┘
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod dead_letter;
pub mod journal;
pub mod publisher;
#[cfg(feature = "rocksdb")]
pub mod rocksdb_queue;
pub mod subscriber;

// Re-export main types
pub use dead_letter::{dead_letter_topic, is_dead_letter_topic, DeadLetterRecord};
pub use journal::{JournaledMessage, MessageJournal};
pub use publisher::{AckMode, InMemoryQueue, QueueOptions, QueueTransport, TransportError};
#[cfg(feature = "rocksdb")]
pub use rocksdb_queue::{RocksDbJournal, RocksDbQueue, RocksDbQueueConfig};
pub use subscriber::{Acknowledger, Delivery, Subscription};

/// Maximum messages buffered per topic before publishers see backpressure.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Maximum records buffered per dead-letter topic.
pub const DEFAULT_DEAD_LETTER_CAPACITY: usize = 100_000;

/// Well-known topic carrying transaction envelopes.
pub const TRANSACTIONS_TOPIC: &str = "transactions";

/// Suffix appended to a topic name to form its dead-letter topic.
pub const DLQ_SUFFIX: &str = ".dlq";
