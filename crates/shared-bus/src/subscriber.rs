//! # Queue Subscriber
//!
//! Defines the subscription side of the transport: a lazy sequence of
//! deliveries, each carrying its own acknowledgment handle.

use crate::publisher::TransportError;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

/// Settles deliveries on behalf of a transport.
///
/// Implemented by each transport; `Delivery` calls back into it exactly
/// once per delivery.
pub trait Acknowledger: Send + Sync {
    /// Confirm the message was handled; the transport forgets it.
    fn ack(&self, delivery_tag: u64) -> Result<(), TransportError>;

    /// Reject the message. With `requeue` the transport redelivers it.
    fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), TransportError>;

    /// Return the message to the back of the queue, keeping its delivery
    /// count, so messages queued behind it go first.
    ///
    /// Transports without ordering control requeue as `nack` does.
    fn defer(&self, delivery_tag: u64) -> Result<(), TransportError> {
        self.nack(delivery_tag, true)
    }
}

/// A message handed to a subscriber.
///
/// Must be settled with [`Delivery::ack`] or [`Delivery::nack`]. A delivery
/// dropped unsettled is requeued, so a handler that panics or is cancelled
/// never loses the message.
pub struct Delivery {
    payload: Vec<u8>,
    delivery_tag: u64,
    delivery_count: u32,
    /// `None` once settled, or from the start under auto-ack.
    acker: Option<Arc<dyn Acknowledger>>,
}

impl Delivery {
    /// Create a delivery that must be settled through `acker`.
    pub fn new(
        payload: Vec<u8>,
        delivery_tag: u64,
        delivery_count: u32,
        acker: Arc<dyn Acknowledger>,
    ) -> Self {
        Self {
            payload,
            delivery_tag,
            delivery_count,
            acker: Some(acker),
        }
    }

    /// Create a delivery the transport already acknowledged.
    pub fn pre_acknowledged(payload: Vec<u8>, delivery_tag: u64, delivery_count: u32) -> Self {
        Self {
            payload,
            delivery_tag,
            delivery_count,
            acker: None,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }

    /// 1 on first delivery, incremented on every redelivery.
    pub fn delivery_count(&self) -> u32 {
        self.delivery_count
    }

    pub fn redelivered(&self) -> bool {
        self.delivery_count > 1
    }

    /// Whether settling this delivery has any effect.
    pub fn requires_ack(&self) -> bool {
        self.acker.is_some()
    }

    /// Acknowledge successful handling.
    pub fn ack(mut self) -> Result<(), TransportError> {
        match self.acker.take() {
            Some(acker) => acker.ack(self.delivery_tag),
            None => Ok(()),
        }
    }

    /// Negatively acknowledge; `requeue` asks for redelivery.
    pub fn nack(mut self, requeue: bool) -> Result<(), TransportError> {
        match self.acker.take() {
            Some(acker) => acker.nack(self.delivery_tag, requeue),
            None => {
                warn!(
                    delivery_tag = self.delivery_tag,
                    "nack on auto-acknowledged delivery has no effect"
                );
                Ok(())
            }
        }
    }

    /// Requeue behind everything already waiting on the topic.
    pub fn defer(mut self) -> Result<(), TransportError> {
        match self.acker.take() {
            Some(acker) => acker.defer(self.delivery_tag),
            None => {
                warn!(
                    delivery_tag = self.delivery_tag,
                    "defer on auto-acknowledged delivery has no effect"
                );
                Ok(())
            }
        }
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        let Some(acker) = self.acker.take() else {
            return;
        };
        debug!(delivery_tag = self.delivery_tag, "Unsettled delivery dropped, requeueing");
        if let Err(e) = acker.nack(self.delivery_tag, true) {
            warn!(delivery_tag = self.delivery_tag, error = %e, "Failed to requeue dropped delivery");
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("delivery_tag", &self.delivery_tag)
            .field("delivery_count", &self.delivery_count)
            .field("bytes", &self.payload.len())
            .field("settled", &self.acker.is_none())
            .finish()
    }
}

/// A subscription handle for receiving deliveries from one topic.
///
/// Ends (`None`) when the transport is closed.
pub struct Subscription {
    topic: String,
    stream: Pin<Box<dyn Stream<Item = Delivery> + Send>>,
}

impl Subscription {
    /// Wrap a transport-specific delivery stream.
    pub fn new(topic: impl Into<String>, stream: impl Stream<Item = Delivery> + Send + 'static) -> Self {
        Self {
            topic: topic.into(),
            stream: Box::pin(stream),
        }
    }

    /// Wait for the next delivery.
    ///
    /// # Returns
    ///
    /// - `Some(delivery)` - The next message
    /// - `None` - The transport was closed
    pub async fn next(&mut self) -> Option<Delivery> {
        self.stream.next().await
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Stream for Subscription {
    type Item = Delivery;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stream.as_mut().poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingAcker {
        acks: Mutex<Vec<u64>>,
        nacks: Mutex<Vec<(u64, bool)>>,
    }

    impl Acknowledger for RecordingAcker {
        fn ack(&self, delivery_tag: u64) -> Result<(), TransportError> {
            self.acks.lock().push(delivery_tag);
            Ok(())
        }

        fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), TransportError> {
            self.nacks.lock().push((delivery_tag, requeue));
            Ok(())
        }
    }

    #[test]
    fn test_ack_settles_once() {
        let acker = Arc::new(RecordingAcker::default());
        let delivery = Delivery::new(b"x".to_vec(), 7, 1, acker.clone());
        delivery.ack().unwrap();

        assert_eq!(*acker.acks.lock(), vec![7]);
        assert!(acker.nacks.lock().is_empty());
    }

    #[test]
    fn test_drop_unsettled_requeues() {
        let acker = Arc::new(RecordingAcker::default());
        {
            let _delivery = Delivery::new(b"x".to_vec(), 3, 2, acker.clone());
        }
        assert_eq!(*acker.nacks.lock(), vec![(3, true)]);
    }

    #[test]
    fn test_defer_falls_back_to_requeue() {
        let acker = Arc::new(RecordingAcker::default());
        Delivery::new(b"x".to_vec(), 5, 1, acker.clone()).defer().unwrap();
        assert_eq!(*acker.nacks.lock(), vec![(5, true)]);
    }

    #[test]
    fn test_pre_acknowledged_is_inert() {
        let delivery = Delivery::pre_acknowledged(b"x".to_vec(), 1, 1);
        assert!(!delivery.requires_ack());
        assert!(!delivery.redelivered());
        assert!(delivery.nack(true).is_ok());
    }

    #[tokio::test]
    async fn test_subscription_wraps_stream() {
        let items = vec![
            Delivery::pre_acknowledged(b"a".to_vec(), 1, 1),
            Delivery::pre_acknowledged(b"b".to_vec(), 2, 1),
        ];
        let mut sub = Subscription::new("t", tokio_stream::iter(items));

        assert_eq!(sub.topic(), "t");
        assert_eq!(sub.next().await.unwrap().payload(), b"a");
        assert_eq!(sub.next().await.unwrap().payload(), b"b");
        assert!(sub.next().await.is_none());
    }
}
