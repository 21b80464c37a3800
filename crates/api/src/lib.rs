//! TalkTime API Library
//!
//! HTTP surface for the settlement engine: the call-provider webhook that
//! triggers settlement, plus health checks. The engine itself lives in
//! `talktime-settlement`; handlers here only translate between HTTP and the
//! orchestrator.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/webhooks/call-events", post(routes::webhooks::call_event))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
