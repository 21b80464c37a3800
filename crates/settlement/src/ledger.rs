//! Expert earnings ledger (read model)
//!
//! Append-only; entries are written exclusively by the settlement charge
//! transaction. Exactly one entry exists per settled order, guaranteed by
//! the orchestrator's status guard, not by ledger-side deduplication.

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::SettlementResult;

/// Ledger entry type for a settled consultation
pub const ENTRY_TYPE_CONSULTATION: &str = "consultation";

/// One earnings ledger entry
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct EarningsEntry {
    pub id: Uuid,
    pub expert_id: Uuid,
    pub entry_type: String,
    pub gross_amount: f64,
    pub platform_fee: f64,
    pub net_amount: f64,
    pub currency: String,
    pub order_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Ledger entries for an expert, newest first
pub async fn entries_for_expert(
    pool: &PgPool,
    expert_id: Uuid,
    limit: i64,
) -> SettlementResult<Vec<EarningsEntry>> {
    let rows: Vec<EarningsEntry> = sqlx::query_as(
        "SELECT id, expert_id, entry_type, gross_amount, platform_fee, net_amount,
                currency, order_id, created_at
         FROM expert_earnings
         WHERE expert_id = $1
         ORDER BY created_at DESC
         LIMIT $2",
    )
    .bind(expert_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Ledger entries recorded for one order (at most one when healthy)
pub async fn entries_for_order(
    pool: &PgPool,
    order_id: Uuid,
) -> SettlementResult<Vec<EarningsEntry>> {
    let rows: Vec<EarningsEntry> = sqlx::query_as(
        "SELECT id, expert_id, entry_type, gross_amount, platform_fee, net_amount,
                currency, order_id, created_at
         FROM expert_earnings
         WHERE order_id = $1
         ORDER BY created_at ASC",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
