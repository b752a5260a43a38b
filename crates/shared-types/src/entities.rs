//! # Core Domain Entities
//!
//! Defines the records that flow through the ingestion pipeline and the
//! aggregates served by the report engine.
//!
//! ## Clusters
//!
//! - **Ledger**: `Transaction`, `TransactionSource`
//! - **Reporting**: `Report`, `ReportTotals`, `ReportKey`

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// CLUSTER A: THE LEDGER
// =============================================================================

/// Identifier of a transaction (primary key in the store).
pub type TransactionId = String;

/// Identifier of the user owning a transaction.
pub type UserId = String;

/// Generate a fresh server-assigned transaction id (UUID v4).
pub fn new_transaction_id() -> TransactionId {
    uuid::Uuid::new_v4().to_string()
}

/// Where a transaction entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionSource {
    /// Entered by hand through the API.
    #[default]
    Manual,
    /// Imported from a bank statement.
    Bank,
    /// Imported from a credit card statement.
    CreditCard,
}

impl fmt::Display for TransactionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "MANUAL"),
            Self::Bank => write!(f, "BANK"),
            Self::CreditCard => write!(f, "CREDIT_CARD"),
        }
    }
}

/// A single unit of financial activity.
///
/// The same schema is used for the HTTP body, the queue envelope and the
/// stored row. A transaction is created unreconciled by the ingestion
/// gateway and finalized (`reconciled = true`) by the consumer once it has
/// been durably persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Globally unique id. May be empty on intake; the gateway assigns one.
    #[serde(default)]
    pub id: TransactionId,
    /// Owner of the transaction.
    pub user_id: UserId,
    /// When the transaction happened. Accepts RFC 3339 or `YYYY-MM-DD`
    /// (midnight UTC). Missing dates decode as the epoch, which validation
    /// rejects.
    #[serde(default, deserialize_with = "deserialize_date")]
    pub date: DateTime<Utc>,
    /// Signed amount. Negative values are expenses.
    pub amount: Decimal,
    /// Free-form category (e.g. `INCOME`, `GROCERIES`).
    #[serde(default)]
    pub category: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Origin of the record.
    #[serde(default)]
    pub source: TransactionSource,
    /// Set once the consumer has persisted the record.
    #[serde(default)]
    pub reconciled: bool,
}

impl Transaction {
    /// Create an unreconciled manual transaction.
    pub fn new(
        id: impl Into<TransactionId>,
        user_id: impl Into<UserId>,
        date: DateTime<Utc>,
        amount: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            date,
            amount,
            category: String::new(),
            description: String::new(),
            source: TransactionSource::Manual,
            reconciled: false,
        }
    }

    /// Builder-style category setter.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Builder-style description setter.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder-style source setter.
    #[must_use]
    pub fn with_source(mut self, source: TransactionSource) -> Self {
        self.source = source;
        self
    }

    /// Encode as the JSON queue envelope.
    pub fn to_envelope(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode a JSON queue envelope.
    pub fn from_envelope(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map(|day| day.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| serde::de::Error::custom(format!("invalid date: {raw}")))
}

// =============================================================================
// CLUSTER B: REPORTING
// =============================================================================

/// Report type that applies no category filter.
pub const REPORT_TYPE_ALL: &str = "ALL";

/// Composite cache key of a report.
///
/// Format: `report:{user_id}:{report_type}:{start}:{end}` where absent dates
/// render as the empty string. `%` and `:` inside the user id and report
/// type are percent-escaped, so distinct tuples never share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportKey {
    pub user_id: UserId,
    pub report_type: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl ReportKey {
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

    /// Category filter implied by the report type, if any.
    pub fn category_filter(&self) -> Option<&str> {
        let report_type = self.report_type.trim();
        if report_type.is_empty() || report_type.eq_ignore_ascii_case(REPORT_TYPE_ALL) {
            None
        } else {
            Some(report_type)
        }
    }

    /// Render the cache key string.
    pub fn cache_key(&self) -> String {
        self.to_string()
    }
}

/// Escape the key separator (and the escape character itself).
fn escape_key_part(part: &str) -> std::borrow::Cow<'_, str> {
    if part.contains(['%', ':']) {
        part.replace('%', "%25").replace(':', "%3A").into()
    } else {
        part.into()
    }
}

impl fmt::Display for ReportKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = self.start.map(|d| d.to_string()).unwrap_or_default();
        let end = self.end.map(|d| d.to_string()).unwrap_or_default();
        write!(
            f,
            "report:{}:{}:{}:{}",
            escape_key_part(&self.user_id),
            escape_key_part(&self.report_type),
            start,
            end
        )
    }
}

/// Aggregate figures over a report's entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTotals {
    /// Sum of positive amounts.
    pub total_income: Decimal,
    /// Sum of the absolute values of negative amounts.
    pub total_expense: Decimal,
    /// `total_income - total_expense`.
    pub net: Decimal,
    /// Number of entries.
    pub count: usize,
}

impl ReportTotals {
    /// Compute totals over a set of transactions.
    pub fn from_entries(entries: &[Transaction]) -> Self {
        entries.iter().fold(Self::default(), |mut totals, tx| {
            if tx.amount.is_sign_negative() {
                totals.total_expense += tx.amount.abs();
            } else {
                totals.total_income += tx.amount;
            }
            totals.net += tx.amount;
            totals.count += 1;
            totals
        })
    }
}

/// Immutable snapshot of a computed report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub user_id: UserId,
    pub report_type: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// When the snapshot was computed from the store.
    pub generated_at: DateTime<Utc>,
    pub totals: ReportTotals,
    pub entries: Vec<Transaction>,
}

impl Report {
    /// Assemble a report for `key` from the matching entries.
    pub fn assemble(key: &ReportKey, entries: Vec<Transaction>, generated_at: DateTime<Utc>) -> Self {
        Self {
            user_id: key.user_id.clone(),
            report_type: key.report_type.clone(),
            start_date: key.start,
            end_date: key.end,
            generated_at,
            totals: ReportTotals::from_entries(&entries),
            entries,
        }
    }
}
