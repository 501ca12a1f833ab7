use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::types::money::Qty;

/// Why a settlement (or a store call made on its behalf) did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Quantity must be a positive whole number, got {0}")]
    InvalidQuantity(String),

    #[error("Invalid transaction type '{0}': must be BUY or SELL")]
    InvalidSide(String),

    #[error("User {0} not found")]
    UnknownUser(Uuid),

    #[error("Stock '{0}' not found")]
    UnknownSymbol(String),

    #[error("Insufficient balance: need {need}, available {available}")]
    InsufficientFunds { need: Decimal, available: Decimal },

    #[error("Insufficient shares of {symbol}: requested {requested}, held {held}")]
    InsufficientShares {
        symbol: String,
        requested: Qty,
        held: Qty,
    },

    #[error("Concurrent settlement conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("{service} unavailable: {reason}")]
    CollaboratorUnavailable {
        service: &'static str,
        reason: String,
    },
}

impl LedgerError {
    /// Transient failures that may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::ConcurrencyConflict(_) | LedgerError::CollaboratorUnavailable { .. }
        )
    }

    pub fn unavailable(service: &'static str, reason: impl Into<String>) -> Self {
        LedgerError::CollaboratorUnavailable {
            service,
            reason: reason.into(),
        }
    }
}
