//! # Dead Letter Records
//!
//! Terminal destination for messages that exhausted their retry budget.

use crate::DLQ_SUFFIX;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the dead-letter topic paired with `topic`.
pub fn dead_letter_topic(topic: &str) -> String {
    format!("{topic}{DLQ_SUFFIX}")
}

/// Whether `topic` is a dead-letter topic.
pub fn is_dead_letter_topic(topic: &str) -> bool {
    topic.ends_with(DLQ_SUFFIX)
}

/// What gets published to a dead-letter topic.
///
/// The original payload is kept verbatim (lossily decoded as UTF-8) so an
/// operator can replay it after fixing the underlying fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    /// Topic the message was consumed from.
    pub topic: String,
    /// Original message body.
    pub payload: String,
    /// Last failure observed.
    pub reason: String,
    /// How many times the message was delivered before giving up.
    pub delivery_count: u32,
    pub dead_lettered_at: DateTime<Utc>,
}

impl DeadLetterRecord {
    pub fn new(topic: &str, payload: &[u8], reason: impl Into<String>, delivery_count: u32) -> Self {
        Self {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            reason: reason.into(),
            delivery_count,
            dead_lettered_at: Utc::now(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
