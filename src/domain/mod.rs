//! Domain types for the portfolio ledger.
//!
//! This module provides:
//! - Domain primitives: TimeMs, Coin
//! - Transaction taxonomy (kinds, strategies, alias resolution)
//! - Transactions and their validated input form
//! - Price quotes, aggregated prices and alert rules
//! - Presentation rounding helpers

use thiserror::Error;

pub mod alert;
pub mod decimal;
pub mod price;
pub mod primitives;
pub mod taxonomy;
pub mod transaction;

pub use alert::{AlertKind, AlertRule, AlertTrigger, NewAlertRule};
pub use price::{AggregatedPrice, PriceQuote};
pub use primitives::{Coin, TimeMs, DAY_MS};
pub use taxonomy::{normalize_kind, normalize_strategy, Direction, Strategy, TxKind};
pub use transaction::{NewTransaction, Transaction, TransactionDraft};

/// Invariant violation at an input boundary. No state change accompanies it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("coin must not be empty")]
    EmptyCoin,
    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(f64),
    #[error("price must not be negative, got {0}")]
    NegativePrice(f64),
    #[error("price must be positive, got {0}")]
    NonPositivePrice(f64),
    #[error("{0} must be a finite number")]
    NonFinite(&'static str),
    #[error("unknown transaction type: {0}")]
    UnknownKind(String),
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),
    #[error("unknown alert kind: {0}")]
    UnknownAlertKind(String),
    #[error("invalid alert threshold: {0}")]
    InvalidThreshold(String),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
