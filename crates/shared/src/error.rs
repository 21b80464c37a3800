//! Error types for TalkTime

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TalkTimeError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("Unknown order status: {0}")]
    UnknownOrderStatus(String),

    #[error("Unknown transaction kind: {0}")]
    UnknownTransactionKind(String),

    #[error("Invalid call reference: {0}")]
    InvalidCallReference(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
