//! Core domain types for the TalkTime platform
//!
//! Enumerations are persisted as validated text columns; conversion happens
//! at the store boundary via the `as_str`/`parse` pairs below so that no
//! untyped strings leak into business logic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::TalkTimeError;

/// Supported settlement currencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Inr,
    Usd,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Inr => "inr",
            Currency::Usd => "usd",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = TalkTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inr" => Ok(Currency::Inr),
            "usd" => Ok(Currency::Usd),
            other => Err(TalkTimeError::UnknownCurrency(other.to_string())),
        }
    }
}

/// Consultation order lifecycle
///
/// `initiated → connected → completed`, with `cancelled` reachable from any
/// non-terminal state. `status` is the only field governing settlement
/// eligibility: the committing write re-checks it inside the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Initiated,
    Connected,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Initiated => "initiated",
            OrderStatus::Connected => "connected",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Whether settlement is allowed to run its committing write
    pub fn is_settleable(&self) -> bool {
        matches!(self, OrderStatus::Connected)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = TalkTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(OrderStatus::Initiated),
            "connected" => Ok(OrderStatus::Connected),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(TalkTimeError::UnknownOrderStatus(other.to_string())),
        }
    }
}

/// Kinds of wallet transactions
///
/// Cash-equivalent kinds increase the wallet's real (cash-backed) balance;
/// promotional kinds only increase face value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Recharge,
    Refund,
    Bonus,
    Cashback,
    Referral,
    ConsultationCharge,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Recharge => "recharge",
            TransactionKind::Refund => "refund",
            TransactionKind::Bonus => "bonus",
            TransactionKind::Cashback => "cashback",
            TransactionKind::Referral => "referral",
            TransactionKind::ConsultationCharge => "consultation_charge",
        }
    }

    /// True for kinds backed by actual cash received by the platform
    pub fn is_cash_equivalent(&self) -> bool {
        matches!(self, TransactionKind::Recharge | TransactionKind::Refund)
    }

    /// True for kinds that add funds to a wallet
    pub fn is_credit(&self) -> bool {
        !matches!(self, TransactionKind::ConsultationCharge)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = TalkTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recharge" => Ok(TransactionKind::Recharge),
            "refund" => Ok(TransactionKind::Refund),
            "bonus" => Ok(TransactionKind::Bonus),
            "cashback" => Ok(TransactionKind::Cashback),
            "referral" => Ok(TransactionKind::Referral),
            "consultation_charge" => Ok(TransactionKind::ConsultationCharge),
            other => Err(TalkTimeError::UnknownTransactionKind(other.to_string())),
        }
    }
}

/// Reference to a call as delivered by the call provider: `{kind}:{order_id}`
///
/// The id component equals the consultation order id, so resolution is a
/// point read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallReference {
    pub kind: String,
    pub order_id: Uuid,
}

impl CallReference {
    pub fn consultation(order_id: Uuid) -> Self {
        Self {
            kind: "consultation".to_string(),
            order_id,
        }
    }
}

impl fmt::Display for CallReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.order_id)
    }
}

impl FromStr for CallReference {
    type Err = TalkTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| TalkTimeError::InvalidCallReference(s.to_string()))?;
        if kind.is_empty() {
            return Err(TalkTimeError::InvalidCallReference(s.to_string()));
        }
        let order_id = Uuid::parse_str(id)
            .map_err(|_| TalkTimeError::InvalidCallReference(s.to_string()))?;
        Ok(Self {
            kind: kind.to_string(),
            order_id,
        })
    }
}

/// A consultation order row
///
/// All monetary fields are NULL until settlement commits them exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConsultationOrder {
    pub id: Uuid,
    pub payer_id: Uuid,
    pub expert_id: Uuid,
    pub status: String,
    pub rate_per_minute: f64,
    pub currency: String,
    pub max_duration_seconds: i32,
    pub platform_fee_percent: f64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub connected_at: Option<OffsetDateTime>,
    pub presence_log: Option<serde_json::Value>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub ended_at: Option<OffsetDateTime>,
    pub billable_seconds: Option<i32>,
    pub cost: Option<f64>,
    pub platform_fee_amount: Option<f64>,
    pub expert_earnings: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ConsultationOrder {
    /// Parse the stored status text into the typed state
    pub fn order_status(&self) -> Result<OrderStatus, TalkTimeError> {
        self.status.parse()
    }

    /// Parse the stored currency text
    pub fn order_currency(&self) -> Result<Currency, TalkTimeError> {
        self.currency.parse()
    }

    pub fn call_reference(&self) -> CallReference {
        CallReference::consultation(self.id)
    }
}

/// A customer wallet row for one currency
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Wallet {
    pub user_id: Uuid,
    pub currency: String,
    /// Face-value balance, including promotional credit
    pub balance: f64,
    /// Cash-backed fraction of the balance; NULL for legacy wallets that
    /// predate real-balance tracking
    pub real_balance: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_roundtrip() {
        assert_eq!("inr".parse::<Currency>().unwrap(), Currency::Inr);
        assert_eq!("USD".parse::<Currency>().unwrap(), Currency::Usd);
        assert_eq!(Currency::Inr.as_str(), "inr");
        assert!("eur".parse::<Currency>().is_err());
    }

    #[test]
    fn test_order_status_guards() {
        assert!(OrderStatus::Connected.is_settleable());
        assert!(!OrderStatus::Initiated.is_settleable());
        assert!(!OrderStatus::Completed.is_settleable());
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Connected.is_terminal());
    }

    #[test]
    fn test_order_status_parse() {
        assert_eq!(
            "connected".parse::<OrderStatus>().unwrap(),
            OrderStatus::Connected
        );
        assert!("paused".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_transaction_kind_classification() {
        assert!(TransactionKind::Recharge.is_cash_equivalent());
        assert!(TransactionKind::Refund.is_cash_equivalent());
        assert!(!TransactionKind::Bonus.is_cash_equivalent());
        assert!(!TransactionKind::Cashback.is_cash_equivalent());
        assert!(!TransactionKind::Referral.is_cash_equivalent());

        assert!(TransactionKind::Bonus.is_credit());
        assert!(!TransactionKind::ConsultationCharge.is_credit());
    }

    #[test]
    fn test_call_reference_parse() {
        let id = Uuid::new_v4();
        let raw = format!("consultation:{}", id);
        let parsed: CallReference = raw.parse().unwrap();
        assert_eq!(parsed.kind, "consultation");
        assert_eq!(parsed.order_id, id);
        assert_eq!(parsed.to_string(), raw);
    }

    #[test]
    fn test_call_reference_rejects_garbage() {
        assert!("".parse::<CallReference>().is_err());
        assert!("consultation".parse::<CallReference>().is_err());
        assert!(":not-a-uuid".parse::<CallReference>().is_err());
        assert!("consultation:not-a-uuid".parse::<CallReference>().is_err());
    }
}
