//! Settlement error types

use thiserror::Error;
use uuid::Uuid;

/// Settlement-specific errors
///
/// A lost settlement race is NOT an error: concurrent invocations that
/// observe the order already transitioned report a success-class `Skipped`
/// outcome (see `settle::SettlementOutcome`). Everything here is either a
/// caller mistake (not retryable) or an unexpected failure the caller's own
/// retry policy handles, safe because settlement is idempotent.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("Order not found for call reference: {0}")]
    OrderNotFound(String),

    #[error("Order {order_id} is not in a settleable state: {status}")]
    InvalidState { order_id: Uuid, status: String },

    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for SettlementError {
    fn from(err: sqlx::Error) -> Self {
        SettlementError::Database(err.to_string())
    }
}

impl From<talktime_shared::TalkTimeError> for SettlementError {
    fn from(err: talktime_shared::TalkTimeError) -> Self {
        SettlementError::InvalidRecord(err.to_string())
    }
}

pub type SettlementResult<T> = Result<T, SettlementError>;
