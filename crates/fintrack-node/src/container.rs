//! # Service Container
//!
//! Builds every component once, in dependency order, and owns the shared
//! handles for the lifetime of the process.
//!
//! ```text
//! Level 0: Queue transport, Transaction store, Report cache
//! Level 1: Ingestion gateway (transport), Consumer (transport + store),
//!          Report engine (store + cache)
//! Level 2: HTTP state (gateway + store + engine)
//! ```
//!
//! With the `rocksdb` feature, `queue.backend = rocksdb` selects the durable
//! `RocksDbQueue`; otherwise the transport is the in-memory queue.
//!
//! Shutdown runs in the reverse direction of data flow: the transport is
//! closed first so the consumer stops receiving, then the store, then the
//! cache.

use crate::config::{NodeConfig, StoreBackend};
use ft_01_transaction_store::{InMemoryTransactionStore, StoreError, TransactionStore};
use ft_02_report_cache::{MokaReportCache, ReportCache};
use ft_03_ingestion_gateway::{GatewayConfig, IngestionGateway, RetryPolicy};
use ft_04_transaction_consumer::{ConsumerConfig, TransactionConsumer};
use ft_05_report_engine::{ReportEngine, ReportEngineConfig};
use ft_06_http_api::{AppState, HttpConfig};
use shared_bus::{InMemoryQueue, QueueTransport, TransportError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Failure while wiring components together.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("failed to open transaction store: {0}")]
    Store(#[from] StoreError),

    #[error("failed to open queue transport: {0}")]
    Transport(#[from] TransportError),

    #[error("backend `{0}` is not compiled into this binary")]
    BackendUnavailable(StoreBackend),
}

/// Central container holding all component instances.
pub struct ServiceContainer {
    config: NodeConfig,

    // =========================================================================
    // LEVEL 0: Infrastructure capabilities
    // =========================================================================
    pub transport: Arc<dyn QueueTransport>,
    pub store: Arc<dyn TransactionStore>,
    pub cache: Arc<dyn ReportCache>,

    // =========================================================================
    // LEVEL 1: Pipeline services
    // =========================================================================
    pub gateway: Arc<IngestionGateway>,
    pub consumer: Arc<TransactionConsumer>,
    pub reports: Arc<ReportEngine>,
}

impl ServiceContainer {
    /// Build all components from `config`.
    #[instrument(skip(config), fields(store = %config.storage.backend, queue = %config.queue.backend))]
    pub fn new(config: NodeConfig) -> Result<Self, ContainerError> {
        let transport = open_transport(&config)?;
        let store = open_store(&config)?;
        let cache: Arc<dyn ReportCache> = Arc::new(MokaReportCache::new(config.cache.max_entries));

        Ok(Self::assemble(config, transport, store, cache))
    }

    /// Wire services on top of already-built capabilities.
    ///
    /// Lets integration tests substitute doubles for any Level 0 component.
    pub fn with_components(
        config: NodeConfig,
        transport: Arc<dyn QueueTransport>,
        store: Arc<dyn TransactionStore>,
        cache: Arc<dyn ReportCache>,
    ) -> Self {
        Self::assemble(config, transport, store, cache)
    }

    /// In-memory container with default configuration.
    pub fn new_for_testing() -> Self {
        let config = NodeConfig::default();
        let transport: Arc<dyn QueueTransport> = Arc::new(InMemoryQueue::new());
        let store: Arc<dyn TransactionStore> = Arc::new(InMemoryTransactionStore::new());
        let cache: Arc<dyn ReportCache> = Arc::new(MokaReportCache::new(config.cache.max_entries));
        Self::assemble(config, transport, store, cache)
    }

    fn assemble(
        config: NodeConfig,
        transport: Arc<dyn QueueTransport>,
        store: Arc<dyn TransactionStore>,
        cache: Arc<dyn ReportCache>,
    ) -> Self {
        let gateway = IngestionGateway::new(
            Arc::clone(&transport),
            GatewayConfig {
                topic: config.queue.topic.clone(),
                amount_policy: config.ingest.amount_policy,
                retry: RetryPolicy::default().with_max_attempts(config.ingest.publish_attempts),
            },
        );

        let consumer = TransactionConsumer::new(
            Arc::clone(&transport),
            Arc::clone(&store),
            ConsumerConfig {
                topic: config.queue.topic.clone(),
                amount_policy: config.ingest.amount_policy,
                max_deliveries: config.delivery.max_deliveries,
                retry_backoff: config.delivery.retry_backoff,
                persist_timeout: config.delivery.persist_timeout,
            },
        );

        let reports = ReportEngine::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            ReportEngineConfig {
                ttl: config.cache.report_ttl,
                query_timeout: config.reports.query_timeout,
            },
        );

        info!(
            topic = %config.queue.topic,
            ack_mode = ?config.queue.ack_mode,
            amount_policy = ?config.ingest.amount_policy,
            "Service container initialized"
        );

        Self {
            config,
            transport,
            store,
            cache,
            gateway: Arc::new(gateway),
            consumer: Arc::new(consumer),
            reports: Arc::new(reports),
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Shared state for the HTTP handlers.
    pub fn app_state(&self) -> AppState {
        AppState {
            intake: self.gateway.clone(),
            store: Arc::clone(&self.store),
            reports: Arc::clone(&self.reports),
        }
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            listen_addr: self.config.server.listen_addr(),
            request_timeout: self.config.server.request_timeout,
        }
    }

    /// Release every capability: transport, then store, then cache.
    ///
    /// Failures are logged; the remaining components are still closed.
    pub async fn shutdown(&self) {
        self.transport.close().await;
        info!("Queue transport closed");

        if let Err(e) = self.store.close().await {
            warn!(error = %e, "Transaction store did not close cleanly");
        } else {
            info!("Transaction store closed");
        }

        if let Err(e) = self.cache.close().await {
            warn!(error = %e, "Report cache did not close cleanly");
        } else {
            info!("Report cache closed");
        }
    }
}

#[cfg(feature = "rocksdb")]
fn open_store(config: &NodeConfig) -> Result<Arc<dyn TransactionStore>, ContainerError> {
    use ft_01_transaction_store::{RocksDbStoreConfig, RocksDbTransactionStore};

    match config.storage.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryTransactionStore::new())),
        StoreBackend::RocksDb => {
            let store = RocksDbTransactionStore::open(RocksDbStoreConfig {
                path: config.storage.path.clone(),
                ..RocksDbStoreConfig::default()
            })?;
            Ok(Arc::new(store))
        }
    }
}

#[cfg(feature = "rocksdb")]
fn open_transport(config: &NodeConfig) -> Result<Arc<dyn QueueTransport>, ContainerError> {
    use shared_bus::{RocksDbQueue, RocksDbQueueConfig};

    match config.queue.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryQueue::with_options(config.queue.options()))),
        StoreBackend::RocksDb => {
            let queue = RocksDbQueue::open(
                RocksDbQueueConfig {
                    path: config.queue.path.clone(),
                    ..RocksDbQueueConfig::default()
                },
                config.queue.options(),
            )?;
            Ok(Arc::new(queue))
        }
    }
}

#[cfg(not(feature = "rocksdb"))]
fn open_transport(config: &NodeConfig) -> Result<Arc<dyn QueueTransport>, ContainerError> {
    match config.queue.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryQueue::with_options(config.queue.options()))),
        backend => Err(ContainerError::BackendUnavailable(backend)),
    }
}

#[cfg(not(feature = "rocksdb"))]
fn open_store(config: &NodeConfig) -> Result<Arc<dyn TransactionStore>, ContainerError> {
    match config.storage.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryTransactionStore::new())),
        backend => Err(ContainerError::BackendUnavailable(backend)),
    }
}
