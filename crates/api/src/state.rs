//! Shared application state

use sqlx::PgPool;
use std::sync::Arc;

use talktime_settlement::{HttpTimelineClient, SettlementService};

use crate::config::Config;

/// State shared across request handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub settlement: SettlementService<HttpTimelineClient>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: Config,
        settlement: SettlementService<HttpTimelineClient>,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            settlement,
        }
    }
}
