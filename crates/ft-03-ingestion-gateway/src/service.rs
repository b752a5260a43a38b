//! # Ingestion Gateway Service
//!
//! Validates a candidate, assigns an id when missing, encodes the JSON
//! envelope and publishes it. Returns as soon as the transport accepted the
//! message; persistence happens later in the consumer.

use crate::adapters::JsonStatementParser;
use crate::domain::{IngestError, RetryPolicy};
use crate::ports::{Accepted, StatementParser, TransactionIntake};
use async_trait::async_trait;
use shared_bus::{QueueTransport, TRANSACTIONS_TOPIC};
use shared_types::{new_transaction_id, AmountPolicy, Transaction, TransactionValidator};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Topic transaction envelopes are published to.
    pub topic: String,
    pub amount_policy: AmountPolicy,
    pub retry: RetryPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            topic: TRANSACTIONS_TOPIC.to_string(),
            amount_policy: AmountPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Asynchronous-write front door of the pipeline.
///
/// Never touches the store. On success exactly one message is enqueued per
/// accepted transaction.
pub struct IngestionGateway {
    transport: Arc<dyn QueueTransport>,
    parser: Arc<dyn StatementParser>,
    validator: TransactionValidator,
    config: GatewayConfig,
}

impl IngestionGateway {
    pub fn new(transport: Arc<dyn QueueTransport>, config: GatewayConfig) -> Self {
        Self {
            transport,
            parser: Arc::new(JsonStatementParser::default()),
            validator: TransactionValidator::new(config.amount_policy),
            config,
        }
    }

    /// Replace the statement parser used by `import`.
    #[must_use]
    pub fn with_parser(mut self, parser: Arc<dyn StatementParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn topic(&self) -> &str {
        &self.config.topic
    }

    /// Assign an id if absent and reset the lifecycle flag.
    fn prepare(mut candidate: Transaction) -> Transaction {
        if candidate.id.trim().is_empty() {
            candidate.id = new_transaction_id();
        }
        candidate.reconciled = false;
        candidate
    }

    async fn publish(&self, tx: &Transaction) -> Result<(), IngestError> {
        let payload = tx
            .to_envelope()
            .map_err(|e| IngestError::Serialization(e.to_string()))?;
        let policy = &self.config.retry;

        let mut attempt = 1;
        loop {
            match self
                .transport
                .publish(&self.config.topic, payload.clone())
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                    let backoff = policy.backoff(attempt);
                    warn!(
                        id = %tx.id,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Publish failed, retrying after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(IngestError::Publish {
                        attempts: attempt,
                        source: e,
                    })
                }
            }
        }
    }
}

#[async_trait]
impl TransactionIntake for IngestionGateway {
    #[instrument(skip(self, candidate), fields(user_id = %candidate.user_id))]
    async fn submit(&self, candidate: Transaction) -> Result<Accepted, IngestError> {
        self.validator.validate(&candidate)?;
        let tx = Self::prepare(candidate);

        self.publish(&tx).await?;
        info!(id = %tx.id, amount = %tx.amount, "Transaction accepted");
        Ok(Accepted { id: tx.id })
    }

    #[instrument(skip(self, statement), fields(bytes = statement.len()))]
    async fn import(&self, statement: &[u8]) -> Result<Vec<Accepted>, IngestError> {
        let entries = self.parser.parse(statement).map_err(IngestError::Import)?;

        for (index, entry) in entries.iter().enumerate() {
            self.validator
                .validate(entry)
                .map_err(|source| IngestError::InvalidEntry { index, source })?;
        }
        debug!(count = entries.len(), "Statement validated");

        let mut accepted = Vec::with_capacity(entries.len());
        for entry in entries {
            let tx = Self::prepare(entry);
            self.publish(&tx).await?;
            accepted.push(Accepted { id: tx.id });
        }
        info!(count = accepted.len(), "Statement imported");
        Ok(accepted)
    }
}
