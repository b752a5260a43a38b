//! # Queue Publisher
//!
//! Defines the `QueueTransport` capability and the queue behind both the
//! in-memory and the journaled transports.

use crate::dead_letter::is_dead_letter_topic;
use crate::journal::MessageJournal;
use crate::subscriber::{Acknowledger, Delivery, Subscription};
use crate::{DEFAULT_DEAD_LETTER_CAPACITY, DEFAULT_QUEUE_CAPACITY};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Errors from transport operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Broker unreachable or refused the operation.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// Topic is at capacity (backpressure).
    #[error("queue {topic} is full (capacity {capacity})")]
    QueueFull { topic: String, capacity: usize },

    /// The topic name cannot be stored by this transport.
    #[error("invalid topic name: {0:?}")]
    InvalidTopic(String),

    /// The transport was closed.
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// Whether a publisher should retry after backing off.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::QueueFull { .. })
    }
}

/// When deliveries are acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    /// The subscriber acks explicitly after handling (at-least-once).
    #[default]
    Manual,
    /// The transport acks on delivery (at-most-once).
    Auto,
}

impl FromStr for AckMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown ack mode: {other}")),
        }
    }
}

/// Durable topic with publish and subscribe-with-acknowledgment semantics.
///
/// Implementations must deliver every published payload at least once to an
/// active subscriber and redeliver anything not acknowledged.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Publish a payload to a topic.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Open a subscription on a topic. Subscribers on the same topic compete
    /// for messages; each message goes to one of them.
    async fn subscribe(&self, topic: &str) -> Result<Subscription, TransportError>;

    /// Acknowledgment mode this transport was configured with.
    fn ack_mode(&self) -> AckMode;

    /// Stop accepting operations and end all subscriptions.
    async fn close(&self);
}

// =============================================================================
// IN-MEMORY IMPLEMENTATION
// =============================================================================

/// Capacity and acknowledgment settings for a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueOptions {
    /// Ready messages per topic before publishers see `QueueFull`.
    pub capacity: usize,
    /// Ready messages per dead-letter topic. Kept apart from `capacity` so
    /// an undrained dead-letter topic never blocks the topic feeding it.
    pub dead_letter_capacity: usize,
    pub ack_mode: AckMode,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            dead_letter_capacity: DEFAULT_DEAD_LETTER_CAPACITY,
            ack_mode: AckMode::Manual,
        }
    }
}

#[derive(Debug, Clone)]
struct QueuedMessage {
    id: u64,
    payload: Vec<u8>,
    delivery_count: u32,
}

/// Per-topic state: messages waiting for a subscriber and messages handed
/// out but not yet settled.
struct TopicQueue {
    name: String,
    ready: Mutex<VecDeque<QueuedMessage>>,
    in_flight: Mutex<HashMap<u64, QueuedMessage>>,
    notify: Notify,
    journal: Option<Arc<dyn MessageJournal>>,
}

impl TopicQueue {
    fn new(name: &str, journal: Option<Arc<dyn MessageJournal>>) -> Self {
        Self {
            name: name.to_string(),
            ready: Mutex::new(VecDeque::new()),
            in_flight: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            journal,
        }
    }

    fn requeue_front(&self, message: QueuedMessage) {
        self.ready.lock().push_front(message);
        self.notify.notify_one();
    }

    fn requeue_back(&self, message: QueuedMessage) {
        self.ready.lock().push_back(message);
        self.notify.notify_one();
    }

    fn forget(&self, message: &QueuedMessage) -> Result<(), TransportError> {
        match &self.journal {
            Some(journal) => journal.remove(&self.name, message.id),
            None => Ok(()),
        }
    }

    fn take_in_flight(&self, delivery_tag: u64) -> Option<QueuedMessage> {
        self.in_flight.lock().remove(&delivery_tag)
    }
}

impl Acknowledger for TopicQueue {
    fn ack(&self, delivery_tag: u64) -> Result<(), TransportError> {
        match self.take_in_flight(delivery_tag) {
            Some(message) => self.forget(&message),
            None => Ok(()),
        }
    }

    fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), TransportError> {
        let Some(message) = self.take_in_flight(delivery_tag) else {
            return Ok(());
        };
        if requeue {
            self.requeue_front(message);
            Ok(())
        } else {
            debug!(delivery_tag, "Message rejected without requeue, discarded");
            self.forget(&message)
        }
    }

    fn defer(&self, delivery_tag: u64) -> Result<(), TransportError> {
        if let Some(message) = self.take_in_flight(delivery_tag) {
            self.requeue_back(message);
        }
        Ok(())
    }
}

struct QueueState {
    topics: RwLock<HashMap<String, Arc<TopicQueue>>>,
    closed: AtomicBool,
    next_tag: AtomicU64,
    next_id: AtomicU64,
    published: AtomicU64,
    /// Test hook: number of upcoming publishes to fail as unavailable.
    fail_publishes: AtomicU32,
    options: QueueOptions,
    journal: Option<Arc<dyn MessageJournal>>,
}

impl QueueState {
    fn topic(&self, name: &str) -> Arc<TopicQueue> {
        if let Some(queue) = self.topics.read().get(name) {
            return Arc::clone(queue);
        }
        let mut topics = self.topics.write();
        let queue = topics
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(TopicQueue::new(name, self.journal.clone())));
        Arc::clone(queue)
    }

    fn capacity_for(&self, topic: &str) -> usize {
        if is_dead_letter_topic(topic) {
            self.options.dead_letter_capacity
        } else {
            self.options.capacity
        }
    }

    /// Pop the next ready message and register it as in flight.
    fn take_next(&self, queue: &Arc<TopicQueue>) -> Option<Delivery> {
        let mut message = queue.ready.lock().pop_front()?;
        message.delivery_count += 1;
        let tag = self.next_tag.fetch_add(1, Ordering::Relaxed);

        match self.options.ack_mode {
            AckMode::Auto => {
                if let Err(e) = queue.forget(&message) {
                    warn!(topic = %queue.name, error = %e, "Failed to remove auto-acknowledged message from journal");
                }
                Some(Delivery::pre_acknowledged(
                    message.payload,
                    tag,
                    message.delivery_count,
                ))
            }
            AckMode::Manual => {
                if let Some(journal) = &queue.journal {
                    if let Err(e) =
                        journal.record_delivery(&queue.name, message.id, message.delivery_count)
                    {
                        warn!(topic = %queue.name, error = %e, "Failed to journal delivery count");
                    }
                }
                let delivery = Delivery::new(
                    message.payload.clone(),
                    tag,
                    message.delivery_count,
                    Arc::clone(queue) as Arc<dyn Acknowledger>,
                );
                queue.in_flight.lock().insert(tag, message);
                Some(delivery)
            }
        }
    }
}

/// Queue transport with an in-memory index.
///
/// Without a journal, messages do not survive a restart; this is the
/// development transport and test double. With a journal (see
/// `RocksDbQueue`), every held message is recovered on startup.
#[derive(Clone)]
pub struct InMemoryQueue {
    state: Arc<QueueState>,
}

impl InMemoryQueue {
    /// Create a new in-memory queue with default capacity and manual acks.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(QueueOptions::default())
    }

    /// Create a new in-memory queue with per-topic `capacity`.
    #[must_use]
    pub fn with_config(capacity: usize, ack_mode: AckMode) -> Self {
        Self::with_options(QueueOptions {
            capacity,
            ack_mode,
            ..QueueOptions::default()
        })
    }

    #[must_use]
    pub fn with_options(options: QueueOptions) -> Self {
        Self::build(options, None)
    }

    /// Create a queue backed by `journal`, replaying every message it holds.
    ///
    /// Recovered messages are ready again in publish order and keep their
    /// delivery counts; new publishes continue after the highest id.
    pub fn with_journal(
        options: QueueOptions,
        journal: Arc<dyn MessageJournal>,
    ) -> Result<Self, TransportError> {
        let mut recovered = journal.recover()?;
        recovered.sort_by_key(|message| message.id);

        let queue = Self::build(options, Some(journal));
        let replayed = recovered.len();
        let mut next_id = 1;
        for message in recovered {
            next_id = next_id.max(message.id + 1);
            queue.state.topic(&message.topic).ready.lock().push_back(QueuedMessage {
                id: message.id,
                payload: message.payload,
                delivery_count: message.delivery_count,
            });
        }
        queue.state.next_id.store(next_id, Ordering::SeqCst);
        if replayed > 0 {
            info!(replayed, next_id, "Journal replayed");
        }
        Ok(queue)
    }

    fn build(options: QueueOptions, journal: Option<Arc<dyn MessageJournal>>) -> Self {
        Self {
            state: Arc::new(QueueState {
                topics: RwLock::new(HashMap::new()),
                closed: AtomicBool::new(false),
                next_tag: AtomicU64::new(1),
                next_id: AtomicU64::new(1),
                published: AtomicU64::new(0),
                fail_publishes: AtomicU32::new(0),
                options,
                journal,
            }),
        }
    }

    /// Messages waiting for a subscriber on `topic`.
    #[must_use]
    pub fn depth(&self, topic: &str) -> usize {
        self.state
            .topics
            .read()
            .get(topic)
            .map_or(0, |q| q.ready.lock().len())
    }

    /// Messages delivered on `topic` but not yet settled.
    #[must_use]
    pub fn in_flight(&self, topic: &str) -> usize {
        self.state
            .topics
            .read()
            .get(topic)
            .map_or(0, |q| q.in_flight.lock().len())
    }

    /// Total successful publishes.
    #[must_use]
    pub fn published_count(&self) -> u64 {
        self.state.published.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.state.options.capacity
    }

    /// Remove and return every ready payload on `topic`.
    pub fn drain(&self, topic: &str) -> Vec<Vec<u8>> {
        let queue = self.state.topic(topic);
        let drained: Vec<_> = queue.ready.lock().drain(..).collect();
        drained
            .into_iter()
            .map(|message| {
                if let Err(e) = queue.forget(&message) {
                    warn!(topic, error = %e, "Failed to remove drained message from journal");
                }
                message.payload
            })
            .collect()
    }

    /// Make the next `count` publishes fail with `TransportError::Unavailable`.
    pub fn fail_next_publishes(&self, count: u32) {
        self.state.fail_publishes.store(count, Ordering::SeqCst);
    }

    fn consume_injected_failure(&self) -> bool {
        self.state
            .fail_publishes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Synchronous publish; blocks on the journal when there is one.
    pub(crate) fn publish_now(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if self.consume_injected_failure() {
            return Err(TransportError::Unavailable("injected failure".into()));
        }

        let queue = self.state.topic(topic);
        let capacity = self.state.capacity_for(topic);
        if queue.ready.lock().len() >= capacity {
            warn!(topic, capacity, "Publish rejected, queue full");
            return Err(TransportError::QueueFull {
                topic: topic.to_string(),
                capacity,
            });
        }

        let id = self.state.next_id.fetch_add(1, Ordering::Relaxed);
        if let Some(journal) = &queue.journal {
            journal.append(topic, id, &payload)?;
        }
        queue.ready.lock().push_back(QueuedMessage {
            id,
            payload,
            delivery_count: 0,
        });
        queue.notify.notify_one();
        self.state.published.fetch_add(1, Ordering::Relaxed);

        debug!(topic, id, "Message published");
        Ok(())
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueTransport for InMemoryQueue {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.publish_now(topic, payload)
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, TransportError> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let queue = self.state.topic(topic);
        let state = Arc::clone(&self.state);

        debug!(topic, ack_mode = ?state.options.ack_mode, "New subscription created");

        let stream = futures::stream::unfold((state, queue), |(state, queue)| async move {
            loop {
                let delivery = {
                    // Register interest before checking so a concurrent
                    // publish or close between the check and the await is
                    // not missed.
                    let notified = queue.notify.notified();
                    tokio::pin!(notified);
                    notified.as_mut().enable();

                    if state.closed.load(Ordering::SeqCst) {
                        return None;
                    }
                    match state.take_next(&queue) {
                        Some(delivery) => Some(delivery),
                        None => {
                            notified.await;
                            None
                        }
                    }
                };
                if let Some(delivery) = delivery {
                    return Some((delivery, (state, queue)));
                }
            }
        });

        Ok(Subscription::new(topic, stream))
    }

    fn ack_mode(&self) -> AckMode {
        self.state.options.ack_mode
    }

    async fn close(&self) {
        if self.state.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        for queue in self.state.topics.read().values() {
            queue.notify.notify_waiters();
        }
        info!("In-memory queue closed");
    }
}
