//! # Node Runtime
//!
//! Owns the background consumer task and the HTTP server for one process.
//!
//! ## Startup Sequence
//!
//! 1. Load and validate configuration
//! 2. Build the service container
//! 3. Spawn the transaction consumer
//! 4. Bind the HTTP listener and serve
//!
//! ## Shutdown Sequence
//!
//! 1. Stop accepting HTTP requests (in-flight ones complete)
//! 2. Signal the consumer; it finishes the message in hand
//! 3. Close transport, store and cache

use crate::container::ServiceContainer;
use ft_06_http_api::{build_router, serve};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Upper bound on waiting for the consumer to finish its current message.
const CONSUMER_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// The running node.
pub struct NodeRuntime {
    container: Arc<ServiceContainer>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    consumer_task: Mutex<Option<JoinHandle<()>>>,
}

impl NodeRuntime {
    pub fn new(container: ServiceContainer) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            container: Arc::new(container),
            shutdown_tx,
            shutdown_rx,
            consumer_task: Mutex::new(None),
        }
    }

    /// Spawn the consumer. Calling twice has no effect.
    pub fn start(&self) {
        let mut slot = self.consumer_task.lock();
        if slot.is_some() {
            return;
        }

        let consumer = Arc::clone(&self.container.consumer);
        let shutdown = self.shutdown_rx.clone();
        *slot = Some(tokio::spawn(async move {
            if let Err(e) = consumer.run(shutdown).await {
                error!(error = %e, "Transaction consumer exited with error");
            }
        }));
        info!("Consumer task spawned");
    }

    /// Serve HTTP on `listener` until `signal` resolves.
    pub async fn serve_until<F>(&self, listener: TcpListener, signal: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = build_router(self.container.app_state(), &self.container.http_config());
        serve(listener, router, signal).await
    }

    /// Stop the consumer and release every component.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            warn!(error = %e, "Consumer already gone before shutdown signal");
        }

        let task = self.consumer_task.lock().take();
        if let Some(task) = task {
            match tokio::time::timeout(CONSUMER_DRAIN_TIMEOUT, task).await {
                Ok(Ok(())) => info!("Consumer stopped"),
                Ok(Err(e)) => error!(error = %e, "Consumer task panicked"),
                Err(_) => warn!(
                    timeout = ?CONSUMER_DRAIN_TIMEOUT,
                    "Consumer did not stop in time; unacknowledged messages will be redelivered"
                ),
            }
        }

        self.container.shutdown().await;
        info!("Shutdown complete");
    }

    pub fn container(&self) -> Arc<ServiceContainer> {
        Arc::clone(&self.container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ft_01_transaction_store::{TransactionFilter, TransactionStore};
    use ft_03_ingestion_gateway::TransactionIntake;
    use shared_types::Transaction;

    #[tokio::test]
    async fn test_consumer_persists_submitted_transaction() {
        let runtime = NodeRuntime::new(ServiceContainer::new_for_testing());
        runtime.start();
        runtime.start();

        let container = runtime.container();
        let tx = Transaction::new(
            "t1",
            "u1",
            chrono::Utc::now(),
            rust_decimal::Decimal::new(-1250, 2),
        )
        .with_category("food");
        container.gateway.submit(tx).await.unwrap();

        let filter = TransactionFilter::for_user("u1");
        let mut stored = Vec::new();
        for _ in 0..100 {
            stored = container.store.query(&filter, None).await.unwrap();
            if !stored.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(stored.len(), 1);
        assert!(stored[0].reconciled);

        runtime.shutdown().await;
        assert!(container.store.get_by_id("t1").await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_without_start() {
        let runtime = NodeRuntime::new(ServiceContainer::new_for_testing());
        runtime.shutdown().await;
    }
}
