//! Call-provider timeline collaborator
//!
//! The call provider records when each participant joined and left a
//! session. Settlement asks for that timeline to compute billable overlap;
//! any failure here is degradable (the orchestrator falls back to an
//! elapsed-time estimate or a zero charge), never fatal.

use serde::{Deserialize, Serialize};

use talktime_shared::CallReference;

use crate::interval::PresenceInterval;

/// One participant's presence segments for a call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantTimeline {
    pub party_id: String,
    #[serde(default)]
    pub intervals: Vec<PresenceInterval>,
}

/// Full presence timeline for a call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallTimeline {
    #[serde(default)]
    pub participants: Vec<ParticipantTimeline>,
}

impl CallTimeline {
    /// Presence intervals for one party, empty if the provider never saw them
    pub fn intervals_for(&self, party_id: &str) -> Vec<PresenceInterval> {
        self.participants
            .iter()
            .find(|p| p.party_id == party_id)
            .map(|p| p.intervals.clone())
            .unwrap_or_default()
    }
}

/// Timeline fetch errors
///
/// All of these are treated as "upstream unavailable" by the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    #[error("call provider request failed: {0}")]
    Request(String),

    #[error("call provider returned HTTP {0}")]
    Status(u16),

    #[error("invalid timeline payload: {0}")]
    Payload(String),
}

/// Source of presence timelines for a call
pub trait TimelineProvider: Send + Sync {
    /// Fetch the presence timeline for a call; `Ok(None)` means the provider
    /// has no session record for this reference
    fn fetch_timeline(
        &self,
        call_ref: &CallReference,
    ) -> impl std::future::Future<Output = Result<Option<CallTimeline>, TimelineError>> + Send;
}

/// Configuration for the call provider's session API
#[derive(Debug, Clone)]
pub struct TimelineConfig {
    /// Base URL, e.g. `https://api.callkit.example`
    pub base_url: String,
    /// Bearer token for the session API
    pub api_key: String,
}

impl TimelineConfig {
    pub fn from_env() -> Result<Self, TimelineError> {
        Ok(Self {
            base_url: std::env::var("CALLKIT_API_URL")
                .map_err(|_| TimelineError::Request("CALLKIT_API_URL not set".to_string()))?,
            api_key: std::env::var("CALLKIT_API_KEY")
                .map_err(|_| TimelineError::Request("CALLKIT_API_KEY not set".to_string()))?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SessionTimelineResponse {
    #[serde(default)]
    found: bool,
    #[serde(default)]
    participants: Vec<ParticipantTimeline>,
}

/// HTTP client for the call provider's session timeline API
#[derive(Clone)]
pub struct HttpTimelineClient {
    http: reqwest::Client,
    config: TimelineConfig,
}

impl HttpTimelineClient {
    pub fn new(config: TimelineConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

impl TimelineProvider for HttpTimelineClient {
    async fn fetch_timeline(
        &self,
        call_ref: &CallReference,
    ) -> Result<Option<CallTimeline>, TimelineError> {
        let url = format!(
            "{}/v1/sessions/{}/{}/timeline",
            self.config.base_url.trim_end_matches('/'),
            call_ref.kind,
            call_ref.order_id
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| TimelineError::Request(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(TimelineError::Status(response.status().as_u16()));
        }

        let body: SessionTimelineResponse = response
            .json()
            .await
            .map_err(|e| TimelineError::Payload(e.to_string()))?;

        if !body.found {
            return Ok(None);
        }

        Ok(Some(CallTimeline {
            participants: body.participants,
        }))
    }
}
