//! In-memory pipeline fixture shared by the integration scenarios.

use chrono::NaiveDate;
use ft_01_transaction_store::{start_of_day, InMemoryTransactionStore};
use ft_02_report_cache::InMemoryReportCache;
use ft_03_ingestion_gateway::{GatewayConfig, IngestionGateway};
use ft_04_transaction_consumer::{ConsumerConfig, Outcome, TransactionConsumer};
use ft_05_report_engine::{CancellationToken, ReportEngine, ReportEngineConfig, ReportRequest};
use rust_decimal::Decimal;
use shared_bus::{InMemoryQueue, QueueTransport, TRANSACTIONS_TOPIC};
use shared_types::{Report, Transaction};
use std::sync::Arc;
use std::time::Duration;

/// Every component wired together, with handles kept on the concrete
/// doubles so tests can inspect and fault them.
pub struct Pipeline {
    pub queue: InMemoryQueue,
    pub store: InMemoryTransactionStore,
    pub cache: InMemoryReportCache,
    pub gateway: IngestionGateway,
    pub consumer: TransactionConsumer,
    pub engine: Arc<ReportEngine>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::with_consumer(ConsumerConfig {
            retry_backoff: Duration::from_millis(1),
            ..ConsumerConfig::default()
        })
    }

    pub fn with_consumer(consumer_config: ConsumerConfig) -> Self {
        let queue = InMemoryQueue::new();
        let store = InMemoryTransactionStore::new();
        let cache = InMemoryReportCache::new();

        let gateway = IngestionGateway::new(Arc::new(queue.clone()), GatewayConfig::default());
        let consumer = TransactionConsumer::new(
            Arc::new(queue.clone()),
            Arc::new(store.clone()),
            consumer_config,
        );
        let engine = Arc::new(ReportEngine::new(
            Arc::new(store.clone()),
            Arc::new(cache.clone()),
            ReportEngineConfig::default(),
        ));

        Self {
            queue,
            store,
            cache,
            gateway,
            consumer,
            engine,
        }
    }

    /// Hand every ready message on the transactions topic to the consumer,
    /// including ones requeued along the way.
    pub async fn drain(&self) -> Vec<Outcome> {
        let mut subscription = self.queue.subscribe(TRANSACTIONS_TOPIC).await.unwrap();
        let mut outcomes = Vec::new();
        while self.queue.depth(TRANSACTIONS_TOPIC) > 0 {
            let delivery = subscription.next().await.unwrap();
            outcomes.push(self.consumer.handle(delivery).await);
        }
        outcomes
    }

    pub async fn report(
        &self,
        user_id: &str,
        report_type: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Report {
        let request = ReportRequest::new(user_id, report_type, start, end);
        self.engine
            .generate(&request, &CancellationToken::new())
            .await
            .unwrap()
    }
}

pub fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Transaction on `date` (midnight UTC) for `cents / 100`.
pub fn tx(id: &str, user_id: &str, date: NaiveDate, cents: i64, category: &str) -> Transaction {
    Transaction::new(id, user_id, start_of_day(date), Decimal::new(cents, 2)).with_category(category)
}
