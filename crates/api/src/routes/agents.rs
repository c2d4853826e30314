use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use tracing::instrument;

use promptlink_common::{ChatReply, CompatibilityReport, PairSuggestion};

use crate::{
    error::ApiError,
    server::AppState,
    types::{
        AgentsResponse, BatchChatRequest, BatchChatResponse, ChatRequest, CompatibilityRequest,
        ErrorResponse, SuggestPairRequest,
    },
};

/// List catalog and configured agents, plus the fallback set
#[utoipa::path(
    get,
    path = "/api/agents",
    responses((status = 200, description = "Agent registry", body = AgentsResponse)),
    tag = "agents"
)]
pub async fn list_agents(State(state): State<AppState>) -> Json<AgentsResponse> {
    let registry = state.orchestrator.registry();
    registry.refresh().await;
    let agents = registry.all_agents();
    let active_count = agents.iter().filter(|a| a.active).count();

    Json(AgentsResponse {
        agents,
        fallback: registry.fallback_agents().to_vec(),
        active_count,
    })
}

/// Send one message to one agent and wait for the reply
#[utoipa::path(
    post,
    path = "/api/agents/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Agent reply", body = ChatReply),
        (status = 404, description = "Unknown agent", body = ErrorResponse),
        (status = 422, description = "Empty message", body = ErrorResponse),
        (status = 502, description = "Upstream failure", body = ErrorResponse),
        (status = 504, description = "Upstream unreachable", body = ErrorResponse),
    ),
    tag = "agents"
)]
#[instrument(skip(state, payload))]
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(request) = payload?;
    let reply = state
        .orchestrator
        .chat(&request.agent_id, &request.message, request.system.as_deref())
        .await?;
    Ok(Json(reply))
}

/// Send one message to several agents and wait for every reply
#[utoipa::path(
    post,
    path = "/api/agents/batch-chat",
    request_body = BatchChatRequest,
    responses(
        (status = 200, description = "Replies in request order", body = BatchChatResponse),
        (status = 422, description = "Empty message or no known agent", body = ErrorResponse),
    ),
    tag = "agents"
)]
#[instrument(skip(state, payload))]
pub async fn batch_chat(
    State(state): State<AppState>,
    payload: Result<Json<BatchChatRequest>, JsonRejection>,
) -> Result<Json<BatchChatResponse>, ApiError> {
    let Json(request) = payload?;
    let responses = state
        .orchestrator
        .batch_chat(&request.agent_ids, &request.message, request.system.as_deref())
        .await?;
    Ok(Json(BatchChatResponse {
        total_responses: responses.len(),
        responses,
        timestamp: chrono::Utc::now(),
    }))
}

/// Score two agents as a debate pair
#[utoipa::path(
    post,
    path = "/api/agents/compatibility",
    request_body = CompatibilityRequest,
    responses(
        (status = 200, description = "Compatibility score", body = CompatibilityReport),
        (status = 404, description = "Unknown agent", body = ErrorResponse),
        (status = 422, description = "Missing agent", body = ErrorResponse),
    ),
    tag = "agents"
)]
#[instrument(skip(state, payload))]
pub async fn compatibility(
    State(state): State<AppState>,
    payload: Result<Json<CompatibilityRequest>, JsonRejection>,
) -> Result<Json<CompatibilityReport>, ApiError> {
    let Json(request) = payload?;
    let report = state
        .orchestrator
        .compatibility(&request.agent_a, &request.agent_b)
        .await?;
    Ok(Json(report))
}

/// Ask a model which agents to pair for a task
#[utoipa::path(
    post,
    path = "/api/agents/suggest-pair",
    request_body = SuggestPairRequest,
    responses(
        (status = 200, description = "Pairing advice", body = PairSuggestion),
        (status = 422, description = "Unknown primary agent", body = ErrorResponse),
        (status = 502, description = "Upstream failure", body = ErrorResponse),
    ),
    tag = "agents"
)]
#[instrument(skip(state, payload))]
pub async fn suggest_pair(
    State(state): State<AppState>,
    payload: Result<Json<SuggestPairRequest>, JsonRejection>,
) -> Result<Json<PairSuggestion>, ApiError> {
    let Json(request) = payload?;
    let suggestion = state
        .orchestrator
        .suggest_pair(
            request.task_type.as_deref(),
            request.primary_agent.as_deref(),
            request.context.as_deref(),
        )
        .await?;
    Ok(Json(suggestion))
}
