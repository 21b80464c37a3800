//! TalkTime API server entrypoint

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use talktime_api::{router, AppState, Config};
use talktime_settlement::{HttpTimelineClient, SettlementService, TimelineConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

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

    let bind_address = config.bind_address.clone();
    let state = AppState::new(pool, config, settlement);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "TalkTime API listening");

    axum::serve(listener, router(state)).await?;

    Ok(())
}
