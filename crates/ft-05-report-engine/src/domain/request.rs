//! # Report Requests

use chrono::NaiveDate;
use ft_01_transaction_store::TransactionFilter;
use serde::{Deserialize, Serialize};
use shared_types::{ReportKey, UserId};

/// Parameters of `generateReport`.
///
/// `report_type` doubles as the category filter unless it is empty or `ALL`.
/// Both dates are inclusive whole days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub user_id: UserId,
    #[serde(default)]
    pub report_type: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl ReportRequest {
    pub fn new(
        user_id: impl Into<UserId>,
        report_type: impl Into<String>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            report_type: report_type.into(),
            start,
            end,
        }
    }

    pub fn key(&self) -> ReportKey {
        ReportKey::new(
            self.user_id.clone(),
            self.report_type.clone(),
            self.start,
            self.end,
        )
    }

    /// Store filter selecting this report's entries.
    pub fn filter(&self) -> TransactionFilter {
        let key = self.key();
        TransactionFilter::for_user(self.user_id.clone())
            .with_category(key.category_filter().map(str::to_string))
            .with_day_range(self.start, self.end)
    }
}
