//! Domain error model.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::money::Money;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input, disallowed transition).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found; carries the resource name.
    #[error("{0} not found")]
    NotFound(String),

    /// A conflict occurred (duplicate document number, stale version).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A payment would exceed the invoice's remaining balance.
    ///
    /// Both values are part of the message so callers can show them as-is.
    #[error("payment of {amount} exceeds the balance due of {balance}")]
    InsufficientBalance { amount: Money, balance: Money },

    /// A payment void was attempted after the 30-day window closed.
    #[error("payment dated {paid_at} is outside the 30-day void window")]
    VoidWindowExpired { paid_at: DateTime<Utc> },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn insufficient_balance(amount: Money, balance: Money) -> Self {
        Self::InsufficientBalance { amount, balance }
    }

    pub fn void_window_expired(paid_at: DateTime<Utc>) -> Self {
        Self::VoidWindowExpired { paid_at }
    }
}
