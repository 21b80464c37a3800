//! Call-provider webhook handler
//!
//! The call provider delivers `call.ended` events at least once, possibly
//! concurrently with the reconciliation sweep. The handler verifies the
//! HMAC signature over the raw body, then hands the call reference to the
//! settlement orchestrator; idempotency lives there, not here.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;

use talktime_shared::CallReference;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Signature header set by the call provider: hex-encoded HMAC-SHA256 of
/// the raw request body
const SIGNATURE_HEADER: &str = "x-callkit-signature";

#[derive(Debug, Deserialize)]
pub struct CallEventPayload {
    pub event: String,
    pub call_reference: String,
}

/// Handle a call lifecycle event
pub async fn call_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::InvalidSignature)?;

    verify_signature(&state.config.callkit_webhook_secret, &body, signature)?;

    let payload: CallEventPayload = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid webhook payload: {}", e)))?;

    if payload.event != "call.ended" {
        tracing::debug!(event = %payload.event, "Ignoring webhook event");
        return Ok(Json(json!({ "status": "ignored", "event": payload.event })));
    }

    let call_ref: CallReference = payload
        .call_reference
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("{}", e)))?;

    tracing::info!(call_reference = %call_ref, "Received call.ended webhook");

    let outcome = state.settlement.settle(&call_ref).await?;
    let response = serde_json::to_value(&outcome).map_err(|_| ApiError::Internal)?;
    Ok(Json(response))
}

/// Verify the hex-encoded HMAC-SHA256 signature over the raw body
///
/// Uses the Mac implementation's constant-time comparison.
fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> ApiResult<()> {
    let expected = hex::decode(signature_hex).map_err(|_| ApiError::InvalidSignature)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| ApiError::Internal)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| ApiError::InvalidSignature)
}
