//! Application configuration

use std::env;

/// Application configuration loaded from environment variables
///
/// Constructed once at startup and passed down explicitly; nothing reads
/// the environment after boot.
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,

    // Database
    pub database_url: String,

    // Call provider (session timeline API + webhook signing)
    pub callkit_api_url: String,
    pub callkit_api_key: String,
    pub callkit_webhook_secret: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),

            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,

            callkit_api_url: env::var("CALLKIT_API_URL")
                .map_err(|_| ConfigError::Missing("CALLKIT_API_URL"))?,
            callkit_api_key: env::var("CALLKIT_API_KEY")
                .map_err(|_| ConfigError::Missing("CALLKIT_API_KEY"))?,
            callkit_webhook_secret: {
                let secret = env::var("CALLKIT_WEBHOOK_SECRET")
                    .map_err(|_| ConfigError::Missing("CALLKIT_WEBHOOK_SECRET"))?;
                if secret.len() < 32 {
                    return Err(ConfigError::WeakSecret(
                        "CALLKIT_WEBHOOK_SECRET must be at least 32 characters",
                    ));
                }
                secret
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
}
