//! Wallet credit operations and point reads
//!
//! Credits (recharge, refund, promotional grants) go through here; the only
//! debit path in the system is the settlement charge transaction in
//! [`crate::settle`], which keeps the at-most-once guarantee in one place.

use serde_json::json;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use talktime_shared::{Currency, TransactionKind, Wallet};

use crate::error::{SettlementError, SettlementResult};
use crate::pricing::real_credit_for;

/// Read a wallet; `Ok(None)` if the user holds no wallet in this currency
pub async fn get_wallet(
    pool: &PgPool,
    user_id: Uuid,
    currency: Currency,
) -> SettlementResult<Option<Wallet>> {
    let wallet: Option<Wallet> = sqlx::query_as(
        "SELECT user_id, currency, balance, real_balance, created_at, updated_at
         FROM wallets WHERE user_id = $1 AND currency = $2",
    )
    .bind(user_id)
    .bind(currency.as_str())
    .fetch_optional(pool)
    .await?;
    Ok(wallet)
}

/// Credit a wallet and append the audit transaction, atomically
///
/// Cash-equivalent kinds raise the real balance by the full amount;
/// promotional kinds only raise face value. Wallets created before
/// real-balance tracking (`real_balance` NULL) stay untracked; starting to
/// track on a credit would retroactively mark their existing balance as
/// promotional.
pub async fn credit_wallet(
    pool: &PgPool,
    user_id: Uuid,
    currency: Currency,
    kind: TransactionKind,
    amount: f64,
) -> SettlementResult<Wallet> {
    if !kind.is_credit() {
        return Err(SettlementError::InvalidInput(format!(
            "transaction kind {} is not a credit",
            kind
        )));
    }
    if amount <= 0.0 || !amount.is_finite() {
        return Err(SettlementError::InvalidInput(format!(
            "credit amount must be positive, got {}",
            amount
        )));
    }

    let real_credit = real_credit_for(kind, amount);

    let mut tx = pool.begin().await?;

    // Read before write; the row lock serializes concurrent credits.
    let existing: Option<Wallet> = sqlx::query_as(
        "SELECT user_id, currency, balance, real_balance, created_at, updated_at
         FROM wallets WHERE user_id = $1 AND currency = $2
         FOR UPDATE",
    )
    .bind(user_id)
    .bind(currency.as_str())
    .fetch_optional(&mut *tx)
    .await?;

    let wallet: Wallet = match existing {
        Some(current) => {
            let new_balance = current.balance + amount;
            // real_balance <= balance must keep holding after the credit
            let new_real = current
                .real_balance
                .map(|real| (real + real_credit).min(new_balance));
            sqlx::query_as(
                "UPDATE wallets SET balance = $1, real_balance = $2, updated_at = NOW()
                 WHERE user_id = $3 AND currency = $4
                 RETURNING user_id, currency, balance, real_balance, created_at, updated_at",
            )
            .bind(new_balance)
            .bind(new_real)
            .bind(user_id)
            .bind(currency.as_str())
            .fetch_one(&mut *tx)
            .await?
        }
        None => {
            sqlx::query_as(
                "INSERT INTO wallets (user_id, currency, balance, real_balance)
                 VALUES ($1, $2, $3, $4)
                 RETURNING user_id, currency, balance, real_balance, created_at, updated_at",
            )
            .bind(user_id)
            .bind(currency.as_str())
            .bind(amount)
            .bind(real_credit)
            .fetch_one(&mut *tx)
            .await?
        }
    };

    sqlx::query(
        "INSERT INTO wallet_transactions (user_id, kind, amount, currency, metadata)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(user_id)
    .bind(kind.as_str())
    .bind(amount)
    .bind(currency.as_str())
    .bind(json!({ "real_credit": real_credit }))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        user_id = %user_id,
        currency = %currency,
        kind = %kind,
        amount = %amount,
        real_credit = %real_credit,
        "Wallet credited"
    );

    Ok(wallet)
}

/// A wallet audit record
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub amount: f64,
    pub currency: String,
    pub order_id: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: OffsetDateTime,
}

/// Recent wallet transactions for a user, newest first
pub async fn list_transactions(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
) -> SettlementResult<Vec<WalletTransaction>> {
    let rows: Vec<WalletTransaction> = sqlx::query_as(
        "SELECT id, user_id, kind, amount, currency, order_id, metadata, created_at
         FROM wallet_transactions
         WHERE user_id = $1
         ORDER BY created_at DESC
         LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
