//! # Application State

use ft_01_transaction_store::TransactionStore;
use ft_03_ingestion_gateway::TransactionIntake;
use ft_05_report_engine::ReportEngine;
use std::sync::Arc;

/// Handles shared by every request task.
#[derive(Clone)]
pub struct AppState {
    /// Write path. Never touches the store.
    pub intake: Arc<dyn TransactionIntake>,
    /// Read path for queries and deletes.
    pub store: Arc<dyn TransactionStore>,
    pub reports: Arc<ReportEngine>,
}
