//! Settlement orchestrator
//!
//! The only component in the engine with side effects. Invoked with a call
//! reference by the call-ended webhook or the reconciliation sweep, both of
//! which deliver at least once and may race each other; every mutation sits
//! inside one database transaction whose write-precondition is a fresh,
//! row-locked read of the order status. A concurrent invocation that loses
//! that race gets a success-class `Skipped` outcome, not an error.

use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use talktime_shared::{CallReference, ConsultationOrder, Currency, OrderStatus, TransactionKind};

use crate::error::{SettlementError, SettlementResult};
use crate::ledger::ENTRY_TYPE_CONSULTATION;
use crate::overlap::overlap_seconds;
use crate::pricing::{call_cost, payout_breakdown, real_balance_after_debit, real_ratio};
use crate::timeline::{CallTimeline, TimelineProvider};

/// Why a settlement attempt was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Another invocation already settled (or cancelled) this order
    AlreadyCompleted,
}

/// Result of one settlement attempt
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SettlementOutcome {
    /// The charge transaction committed on this invocation
    Completed {
        billable_seconds: i64,
        cost: f64,
        platform_fee: f64,
        expert_earnings: f64,
    },
    /// Nothing billable; the order was closed with all monetary fields zero
    ZeroCharge,
    /// A concurrent invocation won the race; treated as success
    Skipped { reason: SkipReason },
}

/// Monetary figures committed by a charge transaction
#[derive(Debug, Clone, Copy)]
struct ChargeFigures {
    billable_seconds: i64,
    cost: f64,
    platform_fee: f64,
    expert_earnings: f64,
}

/// Disposition of a guarded transaction: committed, or lost the race
///
/// A lost race is a typed value, never an error, so callers cannot mistake
/// the expected concurrent-settlement case for a real failure.
enum TxDisposition {
    Committed(ChargeFigures),
    RaceLost { observed: String },
}

/// Coordinates timeline retrieval, pricing, and the atomic settlement write
#[derive(Clone)]
pub struct SettlementService<T> {
    pool: PgPool,
    timeline: T,
}

impl<T: TimelineProvider> SettlementService<T> {
    pub fn new(pool: PgPool, timeline: T) -> Self {
        Self { pool, timeline }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Settle the consultation behind `call_ref`
    ///
    /// Idempotent and safe under concurrent invocation: at most one call
    /// ever commits a charge; later or losing calls observe the completed
    /// order and return `Skipped`.
    pub async fn settle(&self, call_ref: &CallReference) -> SettlementResult<SettlementOutcome> {
        let order: Option<ConsultationOrder> = sqlx::query_as(
            "SELECT id, payer_id, expert_id, status, rate_per_minute, currency,
                    max_duration_seconds, platform_fee_percent, connected_at, presence_log,
                    ended_at, billable_seconds, cost, platform_fee_amount, expert_earnings,
                    created_at, updated_at
             FROM consultation_orders WHERE id = $1",
        )
        .bind(call_ref.order_id)
        .fetch_optional(&self.pool)
        .await?;

        let order = order.ok_or_else(|| SettlementError::OrderNotFound(call_ref.to_string()))?;

        // Advisory fast path only. The authoritative check is the row-locked
        // re-read inside the committing transaction.
        match order.order_status()? {
            OrderStatus::Completed => {
                tracing::debug!(order_id = %order.id, "Order already completed, skipping");
                return Ok(SettlementOutcome::Skipped {
                    reason: SkipReason::AlreadyCompleted,
                });
            }
            OrderStatus::Connected => {}
            other => {
                return Err(SettlementError::InvalidState {
                    order_id: order.id,
                    status: other.to_string(),
                });
            }
        }

        let currency = order.order_currency()?;
        let now = OffsetDateTime::now_utc();

        let billable_seconds = self.billable_seconds(&order, call_ref, now).await?;
        let cost = call_cost(billable_seconds, order.rate_per_minute);

        let disposition = if billable_seconds == 0 || cost <= 0.0 {
            self.zero_charge_transaction(&order, now).await?
        } else {
            self.charge_transaction(&order, currency, billable_seconds, cost, now)
                .await?
        };

        match disposition {
            TxDisposition::Committed(figures) if figures.cost > 0.0 => {
                tracing::info!(
                    order_id = %order.id,
                    billable_seconds = figures.billable_seconds,
                    cost = figures.cost,
                    platform_fee = figures.platform_fee,
                    expert_earnings = figures.expert_earnings,
                    "Consultation settled"
                );
                Ok(SettlementOutcome::Completed {
                    billable_seconds: figures.billable_seconds,
                    cost: figures.cost,
                    platform_fee: figures.platform_fee,
                    expert_earnings: figures.expert_earnings,
                })
            }
            TxDisposition::Committed(_) => {
                tracing::info!(order_id = %order.id, "Consultation settled with zero charge");
                Ok(SettlementOutcome::ZeroCharge)
            }
            TxDisposition::RaceLost { observed } => {
                tracing::debug!(
                    order_id = %order.id,
                    observed_status = %observed,
                    "Settlement race lost, another invocation committed first"
                );
                Ok(SettlementOutcome::Skipped {
                    reason: SkipReason::AlreadyCompleted,
                })
            }
        }
    }

    /// Derive billable seconds from the best available presence source
    ///
    /// Preference order: intervals embedded on the order (orders settled by
    /// the older accumulation method) → the call provider's timeline →
    /// elapsed time since both parties joined → zero.
    async fn billable_seconds(
        &self,
        order: &ConsultationOrder,
        call_ref: &CallReference,
        now: OffsetDateTime,
    ) -> SettlementResult<i64> {
        let cap = i64::from(order.max_duration_seconds);

        if let Some(raw) = &order.presence_log {
            let log: CallTimeline = serde_json::from_value(raw.clone()).map_err(|e| {
                SettlementError::InvalidRecord(format!("presence_log on order {}: {}", order.id, e))
            })?;
            return Ok(overlap_for_order(order, &log, cap, now));
        }

        match self.timeline.fetch_timeline(call_ref).await {
            Ok(Some(timeline)) => Ok(overlap_for_order(order, &timeline, cap, now)),
            Ok(None) => {
                tracing::warn!(
                    order_id = %order.id,
                    "Call provider has no timeline for this call, using elapsed-time fallback"
                );
                Ok(elapsed_fallback(order, cap, now))
            }
            Err(e) => {
                tracing::warn!(
                    order_id = %order.id,
                    error = %e,
                    "Timeline fetch failed, using elapsed-time fallback"
                );
                Ok(elapsed_fallback(order, cap, now))
            }
        }
    }

    /// Close the order with all monetary fields at zero
    async fn zero_charge_transaction(
        &self,
        order: &ConsultationOrder,
        now: OffsetDateTime,
    ) -> SettlementResult<TxDisposition> {
        let mut tx = self.pool.begin().await?;

        match lock_order_status(&mut tx, order.id).await? {
            Some(status) if status == OrderStatus::Connected.as_str() => {}
            Some(status) => return Ok(TxDisposition::RaceLost { observed: status }),
            None => {
                return Ok(TxDisposition::RaceLost {
                    observed: "missing".to_string(),
                })
            }
        }

        sqlx::query(
            "UPDATE consultation_orders
             SET status = $1, ended_at = $2, billable_seconds = 0, cost = 0,
                 platform_fee_amount = 0, expert_earnings = 0, updated_at = NOW()
             WHERE id = $3",
        )
        .bind(OrderStatus::Completed.as_str())
        .bind(now)
        .bind(order.id)
        .execute(&mut *tx)
        .await?;

        clear_busy_if_idle(&mut tx, order.expert_id, order.id).await?;

        tx.commit().await?;

        Ok(TxDisposition::Committed(ChargeFigures {
            billable_seconds: 0,
            cost: 0.0,
            platform_fee: 0.0,
            expert_earnings: 0.0,
        }))
    }

    /// Debit the payer, credit the expert, audit, and close the order in
    /// one atomic transaction, all reads before any writes
    async fn charge_transaction(
        &self,
        order: &ConsultationOrder,
        currency: Currency,
        billable_seconds: i64,
        cost: f64,
        now: OffsetDateTime,
    ) -> SettlementResult<TxDisposition> {
        let mut tx = self.pool.begin().await?;

        // Read phase. Row locks on the order, wallet, and expert serialize
        // concurrent settlements and wallet credits.
        match lock_order_status(&mut tx, order.id).await? {
            Some(status) if status == OrderStatus::Connected.as_str() => {}
            Some(status) => return Ok(TxDisposition::RaceLost { observed: status }),
            None => {
                return Ok(TxDisposition::RaceLost {
                    observed: "missing".to_string(),
                })
            }
        }

        let wallet: Option<(f64, Option<f64>)> = sqlx::query_as(
            "SELECT balance, real_balance FROM wallets
             WHERE user_id = $1 AND currency = $2
             FOR UPDATE",
        )
        .bind(order.payer_id)
        .bind(currency.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let (balance, real_balance) = wallet.unwrap_or((0.0, None));

        let expert: Option<(f64,)> = sqlx::query_as(
            "SELECT earnings_balance FROM experts WHERE id = $1 FOR UPDATE",
        )
        .bind(order.expert_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (earnings_balance,) = expert.ok_or_else(|| {
            SettlementError::InvalidRecord(format!(
                "expert {} referenced by order {} does not exist",
                order.expert_id, order.id
            ))
        })?;

        // Compute phase. The whole cost is a wallet deduction; commission is
        // charged only on its cash-backed fraction.
        let ratio = real_ratio(balance, real_balance);
        let breakdown = payout_breakdown(0.0, cost, ratio, order.platform_fee_percent);
        let new_balance = balance - cost;
        let new_real_balance = real_balance_after_debit(balance, real_balance, cost);

        // Write phase.
        sqlx::query(
            "INSERT INTO wallets (user_id, currency, balance, real_balance)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id, currency) DO UPDATE
             SET balance = EXCLUDED.balance, real_balance = EXCLUDED.real_balance,
                 updated_at = NOW()",
        )
        .bind(order.payer_id)
        .bind(currency.as_str())
        .bind(new_balance)
        .bind(new_real_balance)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO wallet_transactions (user_id, kind, amount, currency, order_id, metadata)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(order.payer_id)
        .bind(TransactionKind::ConsultationCharge.as_str())
        .bind(cost)
        .bind(currency.as_str())
        .bind(order.id)
        .bind(json!({
            "category": "consultation",
            "call_reference": order.call_reference().to_string(),
            "billable_seconds": billable_seconds,
            "rate_per_minute": order.rate_per_minute,
            "real_ratio": breakdown.real_ratio,
            "effective_real_amount": breakdown.effective_real_amount,
        }))
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO expert_earnings
                 (expert_id, entry_type, gross_amount, platform_fee, net_amount, currency, order_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(order.expert_id)
        .bind(ENTRY_TYPE_CONSULTATION)
        .bind(breakdown.effective_real_amount)
        .bind(breakdown.fee_amount)
        .bind(breakdown.expert_earnings)
        .bind(currency.as_str())
        .bind(order.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE experts SET earnings_balance = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(earnings_balance + breakdown.expert_earnings)
        .bind(order.expert_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE consultation_orders
             SET status = $1, ended_at = $2, billable_seconds = $3, cost = $4,
                 platform_fee_amount = $5, expert_earnings = $6, updated_at = NOW()
             WHERE id = $7",
        )
        .bind(OrderStatus::Completed.as_str())
        .bind(now)
        .bind(billable_seconds as i32)
        .bind(cost)
        .bind(breakdown.fee_amount)
        .bind(breakdown.expert_earnings)
        .bind(order.id)
        .execute(&mut *tx)
        .await?;

        clear_busy_if_idle(&mut tx, order.expert_id, order.id).await?;

        tx.commit().await?;

        Ok(TxDisposition::Committed(ChargeFigures {
            billable_seconds,
            cost,
            platform_fee: breakdown.fee_amount,
            expert_earnings: breakdown.expert_earnings,
        }))
    }
}

/// Row-locked status read; the write-precondition for every settlement
/// transaction. A status read outside the transaction must never be trusted
/// in its place.
async fn lock_order_status(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
) -> SettlementResult<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT status FROM consultation_orders WHERE id = $1 FOR UPDATE",
    )
    .bind(order_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(row.map(|(status,)| status))
}

/// Clear the expert's busy flag unless another connected order keeps them busy
async fn clear_busy_if_idle(
    tx: &mut Transaction<'_, Postgres>,
    expert_id: Uuid,
    settling_order_id: Uuid,
) -> SettlementResult<()> {
    sqlx::query(
        "UPDATE experts SET is_busy = FALSE, updated_at = NOW()
         WHERE id = $1 AND is_busy
           AND NOT EXISTS (
               SELECT 1 FROM consultation_orders
               WHERE expert_id = $1 AND status = $2 AND id <> $3
           )",
    )
    .bind(expert_id)
    .bind(OrderStatus::Connected.as_str())
    .bind(settling_order_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Overlap of the payer's and expert's merged presence, capped
fn overlap_for_order(
    order: &ConsultationOrder,
    timeline: &CallTimeline,
    cap: i64,
    now: OffsetDateTime,
) -> i64 {
    let payer = timeline.intervals_for(&order.payer_id.to_string());
    let expert = timeline.intervals_for(&order.expert_id.to_string());
    overlap_seconds(&payer, &expert, cap, now)
}

/// Elapsed time since both parties joined, capped; zero if they never did
fn elapsed_fallback(order: &ConsultationOrder, cap: i64, now: OffsetDateTime) -> i64 {
    match order.connected_at {
        Some(connected_at) if now > connected_at => {
            (now - connected_at).whole_seconds().clamp(0, cap.max(0))
        }
        _ => 0,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::interval::PresenceInterval;
    use time::Duration;

    fn sample_order(connected_at: Option<OffsetDateTime>) -> ConsultationOrder {
        let created = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        ConsultationOrder {
            id: Uuid::new_v4(),
            payer_id: Uuid::new_v4(),
            expert_id: Uuid::new_v4(),
            status: "connected".to_string(),
            rate_per_minute: 5.0,
            currency: "inr".to_string(),
            max_duration_seconds: 600,
            platform_fee_percent: 10.0,
            connected_at,
            presence_log: None,
            ended_at: None,
            billable_seconds: None,
            cost: None,
            platform_fee_amount: None,
            expert_earnings: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_elapsed_fallback_without_connected_at_is_zero() {
        let order = sample_order(None);
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_500).unwrap();
        assert_eq!(elapsed_fallback(&order, 600, now), 0);
    }

    #[test]
    fn test_elapsed_fallback_is_capped() {
        let connected = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let order = sample_order(Some(connected));
        let now = connected + Duration::seconds(10_000);
        assert_eq!(elapsed_fallback(&order, 600, now), 600);
    }

    #[test]
    fn test_elapsed_fallback_future_connected_at_is_zero() {
        let connected = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let order = sample_order(Some(connected));
        assert_eq!(elapsed_fallback(&order, 600, connected - Duration::seconds(5)), 0);
    }

    #[test]
    fn test_overlap_for_order_matches_parties_by_id() {
        let order = sample_order(None);
        let base = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let timeline = CallTimeline {
            participants: vec![
                crate::timeline::ParticipantTimeline {
                    party_id: order.payer_id.to_string(),
                    intervals: vec![PresenceInterval::closed(base, base + Duration::seconds(300))],
                },
                crate::timeline::ParticipantTimeline {
                    party_id: order.expert_id.to_string(),
                    intervals: vec![PresenceInterval::closed(
                        base + Duration::seconds(60),
                        base + Duration::seconds(360),
                    )],
                },
            ],
        };
        let now = base + Duration::seconds(1000);
        assert_eq!(overlap_for_order(&order, &timeline, 600, now), 240);
    }

    #[test]
    fn test_overlap_for_order_unknown_party_yields_zero() {
        let order = sample_order(None);
        let base = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let timeline = CallTimeline {
            participants: vec![crate::timeline::ParticipantTimeline {
                party_id: "someone-else".to_string(),
                intervals: vec![PresenceInterval::closed(base, base + Duration::seconds(300))],
            }],
        };
        assert_eq!(overlap_for_order(&order, &timeline, 600, base), 0);
    }
}
