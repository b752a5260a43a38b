//! # Error Types
//!
//! Defines error types shared by the gateway and the consumer.

use thiserror::Error;

/// A candidate transaction violates an intake invariant.
///
/// Client-facing: resolved where detected, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Amount is zero.
    #[error("transaction amount cannot be zero")]
    ZeroAmount,

    /// Amount is negative while the strictly-positive policy is active.
    #[error("transaction amount must be greater than zero")]
    NonPositiveAmount,

    /// Date is missing or at/before the Unix epoch.
    #[error("invalid transaction date")]
    InvalidDate,

    /// Owner is missing.
    #[error("user_id is required")]
    MissingUserId,
}
