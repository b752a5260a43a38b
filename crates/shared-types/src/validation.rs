//! # Transaction Validation
//!
//! The intake invariants, applied by the ingestion gateway before publishing
//! and re-applied by the consumer before persisting. A message may come from
//! a producer that skipped the gateway, so both sides run the same checks.

use crate::entities::Transaction;
use crate::errors::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which amounts are acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountPolicy {
    /// Any non-zero amount (expenses are negative).
    #[default]
    NonZero,
    /// Only amounts greater than zero.
    StrictlyPositive,
}

impl FromStr for AmountPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "non_zero" | "nonzero" => Ok(Self::NonZero),
            "strictly_positive" | "positive" => Ok(Self::StrictlyPositive),
            other => Err(format!("unknown amount policy: {other}")),
        }
    }
}

/// Stateless validator for candidate transactions.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionValidator {
    policy: AmountPolicy,
}

impl TransactionValidator {
    #[must_use]
    pub fn new(policy: AmountPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> AmountPolicy {
        self.policy
    }

    /// Check the amount, date and owner invariants.
    ///
    /// # Errors
    ///
    /// - `ValidationError::MissingUserId` - empty `user_id`
    /// - `ValidationError::ZeroAmount` - amount is zero
    /// - `ValidationError::NonPositiveAmount` - negative amount under `StrictlyPositive`
    /// - `ValidationError::InvalidDate` - date at or before the epoch
    pub fn validate(&self, tx: &Transaction) -> Result<(), ValidationError> {
        if tx.user_id.trim().is_empty() {
            return Err(ValidationError::MissingUserId);
        }
        if tx.amount.is_zero() {
            return Err(ValidationError::ZeroAmount);
        }
        if self.policy == AmountPolicy::StrictlyPositive && tx.amount.is_sign_negative() {
            return Err(ValidationError::NonPositiveAmount);
        }
        if tx.date <= DateTime::<Utc>::default() {
            return Err(ValidationError::InvalidDate);
        }
        Ok(())
    }
}
