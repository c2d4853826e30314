//! Request and response bodies of the HTTP API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use promptlink_common::{AgentDescriptor, AgentOutcome, ReportFormat, SessionStatus, Strategy};

/// Response of an accepted run
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StartRunResponse {
    /// Identifier to poll and stream
    pub session_id: String,
    pub status: SessionStatus,
    pub strategy: Strategy,
    pub status_url: String,
    pub results_url: String,
    /// WebSocket endpoint with live events
    pub stream_url: String,
}

/// Single synchronous agent call
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatRequest {
    pub agent_id: String,
    pub message: String,
    /// Replaces the agent's default system instruction
    #[serde(default)]
    pub system: Option<String>,
}

/// Same message to several agents
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchChatRequest {
    /// Unknown ids are skipped
    pub agent_ids: Vec<String>,
    pub message: String,
    #[serde(default)]
    pub system: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchChatResponse {
    /// One outcome per known agent, in request order
    pub responses: Vec<AgentOutcome>,
    pub total_responses: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompatibilityRequest {
    pub agent_a: String,
    pub agent_b: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SuggestPairRequest {
    /// Defaults to `general`
    #[serde(default)]
    pub task_type: Option<String>,
    /// Agent that must be part of the pair
    #[serde(default)]
    pub primary_agent: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AggregateRequest {
    /// Summarizing model; the configured default when omitted
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AggregateResponse {
    pub session_id: String,
    pub report: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportQuery {
    /// `html` (default) or `markdown`
    #[serde(default)]
    pub format: Option<ReportFormat>,
}

/// Registry listing
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AgentsResponse {
    /// Configured agents, active and inactive
    pub agents: Vec<AgentDescriptor>,
    /// Agents used when the primary source yields nothing usable
    pub fallback: Vec<AgentDescriptor>,
    pub active_count: usize,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Health status
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Sessions currently held in memory
    pub sessions: usize,
    pub features: Vec<String>,
    /// Timestamp of health check
    pub timestamp: DateTime<Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,

    /// Machine-readable error code
    pub code: Option<String>,

    /// Timestamp of error
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: &str) -> Self {
        Self {
            error: error.into(),
            code: Some(code.to_string()),
            timestamp: Utc::now(),
        }
    }
}
