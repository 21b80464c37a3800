//! Reconciliation sweep for stuck consultation orders
//!
//! The call-ended webhook can be lost; the sweep guarantees every connected
//! order is eventually settled. Racing a webhook delivery is harmless
//! because settlement is idempotent; the loser simply reports `skipped`.

use sqlx::PgPool;
use uuid::Uuid;

use talktime_settlement::{
    SettlementError, SettlementOutcome, SettlementService, TimelineProvider,
};
use talktime_shared::CallReference;

/// Outcome counts for one sweep cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub settled: usize,
    pub zero_charge: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Settle every connected order older than the grace period
///
/// The grace period keeps the sweep from settling calls that are still in
/// progress; a live call is re-examined on a later cycle.
pub async fn sweep_stale_orders<T: TimelineProvider>(
    service: &SettlementService<T>,
    pool: &PgPool,
    grace_minutes: i64,
    batch_size: i64,
) -> SweepSummary {
    let order_ids: Vec<(Uuid,)> = match sqlx::query_as(
        r#"
        SELECT id
        FROM consultation_orders
        WHERE status = 'connected'
          AND connected_at IS NOT NULL
          AND connected_at < NOW() - ($1 || ' minutes')::INTERVAL
        ORDER BY connected_at ASC
        LIMIT $2
        "#,
    )
    .bind(grace_minutes)
    .bind(batch_size)
    .fetch_all(pool)
    .await
    {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch stale orders for reconciliation");
            return SweepSummary::default();
        }
    };

    if order_ids.is_empty() {
        return SweepSummary::default();
    }

    tracing::info!(count = order_ids.len(), "Reconciling stale connected orders");

    let mut summary = SweepSummary::default();

    for (order_id,) in order_ids {
        let call_ref = CallReference::consultation(order_id);
        match service.settle(&call_ref).await {
            Ok(SettlementOutcome::Completed { cost, .. }) => {
                tracing::info!(order_id = %order_id, cost = cost, "Sweep settled order");
                summary.settled += 1;
            }
            Ok(SettlementOutcome::ZeroCharge) => {
                summary.zero_charge += 1;
            }
            Ok(SettlementOutcome::Skipped { .. }) => {
                summary.skipped += 1;
            }
            // An order cancelled between the query and the settle call is
            // expected churn, not a sweep failure.
            Err(SettlementError::InvalidState { status, .. }) => {
                tracing::debug!(order_id = %order_id, status = %status, "Order left settleable state");
                summary.skipped += 1;
            }
            Err(e) => {
                tracing::error!(order_id = %order_id, error = %e, "Sweep settlement failed, will retry next cycle");
                summary.errors += 1;
            }
        }
    }

    tracing::info!(
        settled = summary.settled,
        zero_charge = summary.zero_charge,
        skipped = summary.skipped,
        errors = summary.errors,
        "Completed reconciliation sweep"
    );

    summary
}
