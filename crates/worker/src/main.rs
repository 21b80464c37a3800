//! TalkTime background worker
//!
//! Runs the reconciliation sweep on a cron schedule so that consultation
//! orders whose call-ended webhook was lost still get settled.

mod config;
mod reconciliation;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use talktime_settlement::{HttpTimelineClient, SettlementService, TimelineConfig};

use crate::config::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env()?;

    let pool = talktime_shared::db::create_pool(&config.database_url).await?;

    {
        let migration_pool =
            talktime_shared::db::create_migration_pool(&config.database_url).await?;
        talktime_shared::db::run_migrations(&migration_pool).await?;
        migration_pool.close().await;
    }

    let timeline = HttpTimelineClient::new(TimelineConfig {
        base_url: config.callkit_api_url.clone(),
        api_key: config.callkit_api_key.clone(),
    });
    let settlement = SettlementService::new(pool.clone(), timeline);

    let scheduler = JobScheduler::new().await?;

    let grace_minutes = config.sweep_grace_minutes;
    let batch_size = config.sweep_batch_size;
    let sweep_job = Job::new_async(config.sweep_schedule.as_str(), move |_id, _sched| {
        let settlement = settlement.clone();
        let pool = pool.clone();
        Box::pin(async move {
            reconciliation::sweep_stale_orders(&settlement, &pool, grace_minutes, batch_size)
                .await;
        })
    })?;
    scheduler.add(sweep_job).await?;

    scheduler.start().await?;
    tracing::info!(
        schedule = %config.sweep_schedule,
        grace_minutes = grace_minutes,
        "TalkTime worker started"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping worker");

    Ok(())
}
