//! Worker configuration

use std::env;

/// Worker configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,

    // Call provider session API
    pub callkit_api_url: String,
    pub callkit_api_key: String,

    /// Cron schedule for the reconciliation sweep (seconds granularity)
    pub sweep_schedule: String,
    /// Minimum age of a connected order before the sweep settles it
    pub sweep_grace_minutes: i64,
    /// Maximum orders settled per sweep cycle
    pub sweep_batch_size: i64,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            callkit_api_url: env::var("CALLKIT_API_URL")
                .map_err(|_| ConfigError::Missing("CALLKIT_API_URL"))?,
            callkit_api_key: env::var("CALLKIT_API_KEY")
                .map_err(|_| ConfigError::Missing("CALLKIT_API_KEY"))?,
            sweep_schedule: env::var("SWEEP_SCHEDULE")
                .unwrap_or_else(|_| "0 */5 * * * *".to_string()),
            sweep_grace_minutes: env::var("SWEEP_GRACE_MINUTES")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            sweep_batch_size: env::var("SWEEP_BATCH_SIZE")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .unwrap_or(50),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
