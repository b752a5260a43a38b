//! # Transaction Consumer Service
//!
//! Drains the transaction topic sequentially. Each delivery is acknowledged
//! only after the record is durable or a terminal decision was made, which
//! turns at-least-once delivery into effectively-once persisted state.

use crate::domain::{ConsumerError, ConsumerStats, Outcome, StatsSnapshot};
use ft_01_transaction_store::TransactionStore;
use shared_bus::{
    dead_letter_topic, AckMode, DeadLetterRecord, Delivery, QueueTransport, TransportError,
    TRANSACTIONS_TOPIC,
};
use shared_types::{AmountPolicy, Transaction, TransactionValidator};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

/// Consumer configuration.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Topic to drain.
    pub topic: String,
    pub amount_policy: AmountPolicy,
    /// Deliveries allowed before a message is dead-lettered.
    pub max_deliveries: u32,
    /// Pause before requeueing after a persistence failure.
    pub retry_backoff: Duration,
    /// Bound on a single persistence attempt.
    pub persist_timeout: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            topic: TRANSACTIONS_TOPIC.to_string(),
            amount_policy: AmountPolicy::default(),
            max_deliveries: 5,
            retry_backoff: Duration::from_millis(500),
            persist_timeout: Duration::from_secs(5),
        }
    }
}

/// Single long-lived consumer of transaction envelopes.
pub struct TransactionConsumer {
    transport: Arc<dyn QueueTransport>,
    store: Arc<dyn TransactionStore>,
    validator: TransactionValidator,
    config: ConsumerConfig,
    stats: Arc<ConsumerStats>,
}

fn log_settle_failure(result: Result<(), TransportError>, tag: u64) {
    if let Err(e) = result {
        warn!(delivery_tag = tag, error = %e, "Failed to settle delivery");
    }
}

impl TransactionConsumer {
    pub fn new(
        transport: Arc<dyn QueueTransport>,
        store: Arc<dyn TransactionStore>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            transport,
            store,
            validator: TransactionValidator::new(config.amount_policy),
            config,
            stats: Arc::new(ConsumerStats::default()),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Shared handle to the live counters.
    pub fn stats_handle(&self) -> Arc<ConsumerStats> {
        Arc::clone(&self.stats)
    }

    /// Drain the subscription until `shutdown` flips to `true`, its sender
    /// is dropped, or the transport closes.
    ///
    /// A message being handled when shutdown arrives is finished first.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), ConsumerError> {
        if self.transport.ack_mode() == AckMode::Auto {
            warn!(
                topic = %self.config.topic,
                "Transport acknowledges on delivery; a crash before persistence loses the message"
            );
        }

        let mut subscription = self
            .transport
            .subscribe(&self.config.topic)
            .await
            .map_err(|source| ConsumerError::Subscribe {
                topic: self.config.topic.clone(),
                source,
            })?;
        info!(topic = %self.config.topic, "Transaction consumer started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                next = subscription.next() => match next {
                    Some(delivery) => {
                        self.handle(delivery).await;
                    }
                    None => {
                        info!("Transport closed, consumer stopping");
                        break;
                    }
                }
            }
        }

        info!(stats = ?self.stats(), "Transaction consumer stopped");
        Ok(())
    }

    /// Run one delivery through the state machine and settle it.
    #[instrument(skip(self, delivery), fields(tag = delivery.delivery_tag(), count = delivery.delivery_count()))]
    pub async fn handle(&self, delivery: Delivery) -> Outcome {
        let outcome = self.process(delivery).await;
        self.stats.record(outcome);
        debug!(%outcome, "Delivery handled");
        outcome
    }

    async fn process(&self, delivery: Delivery) -> Outcome {
        let tag = delivery.delivery_tag();

        let mut tx = match Transaction::from_envelope(delivery.payload()) {
            Ok(tx) => tx,
            Err(e) => {
                warn!(error = %e, "Undecodable envelope, dropping");
                log_settle_failure(delivery.ack(), tag);
                return Outcome::Dropped;
            }
        };

        if let Err(e) = self.validator.validate(&tx) {
            warn!(id = %tx.id, error = %e, "Invalid transaction, dropping");
            log_settle_failure(delivery.ack(), tag);
            return Outcome::Dropped;
        }

        tx.reconciled = true;
        let reason = match tokio::time::timeout(self.config.persist_timeout, self.store.upsert(&tx))
            .await
        {
            Ok(Ok(())) => {
                log_settle_failure(delivery.ack(), tag);
                info!(id = %tx.id, user_id = %tx.user_id, "Transaction committed");
                return Outcome::Committed;
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("persist timed out after {:?}", self.config.persist_timeout),
        };

        self.persist_failed(delivery, &tx, reason).await
    }

    async fn persist_failed(&self, delivery: Delivery, tx: &Transaction, reason: String) -> Outcome {
        let tag = delivery.delivery_tag();
        let count = delivery.delivery_count();
        let requeueable = delivery.requires_ack();

        // An auto-acknowledged delivery is already gone from the queue, so
        // it goes straight to the dead-letter topic.
        if requeueable && count < self.config.max_deliveries {
            warn!(
                id = %tx.id,
                attempt = count,
                max = self.config.max_deliveries,
                %reason,
                "Persist failed, requeueing"
            );
            tokio::time::sleep(self.config.retry_backoff).await;
            log_settle_failure(delivery.nack(true), tag);
            return Outcome::Retried;
        }

        let dlq = dead_letter_topic(&self.config.topic);
        let record = DeadLetterRecord::new(&self.config.topic, delivery.payload(), &reason, count);
        let dead_lettered = match record.to_bytes() {
            Ok(bytes) => self
                .transport
                .publish(&dlq, bytes)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        let dlq_error = match dead_lettered {
            Ok(()) => {
                error!(id = %tx.id, deliveries = count, %reason, topic = %dlq, "Transaction dead-lettered");
                log_settle_failure(delivery.ack(), tag);
                return Outcome::DeadLettered;
            }
            Err(e) => e,
        };

        if requeueable {
            // Behind the rest of the topic so it cannot block newer messages.
            error!(id = %tx.id, error = %dlq_error, "Dead-letter publish failed, deferring");
            tokio::time::sleep(self.config.retry_backoff).await;
            log_settle_failure(delivery.defer(), tag);
            return Outcome::Retried;
        }

        match self
            .transport
            .publish(&self.config.topic, delivery.payload().to_vec())
            .await
        {
            Ok(()) => {
                error!(id = %tx.id, error = %dlq_error, "Dead-letter publish failed, republished to topic");
                Outcome::Retried
            }
            Err(e) => {
                error!(
                    id = %tx.id,
                    payload = %String::from_utf8_lossy(delivery.payload()),
                    dead_letter_error = %dlq_error,
                    error = %e,
                    "Transaction could not be dead-lettered or republished"
                );
                Outcome::Lost
            }
        }
    }
}
