//! OpenAPI specification of the relay API, generated with utoipa

use utoipa::OpenApi;

use crate::types::*;
use promptlink_common::{
    AgentDescriptor, AgentOutcome, AgentProfile, ChatReply, CompatibilityLevel,
    CompatibilityReport, EventSource, EventType, PairSuggestion, ReportFormat, ResultsView,
    RunRequest, SessionStatus, SessionSummary, StatusEvent, StatusView, Strategy, TurnPhase,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "PromptLink Relay API",
        description = "
Fan a prompt out to several language models and collect their replies.

## Usage

1. **Start a run**: POST `/api/relay/runs` with a prompt and a strategy (`panel`, `pairs` or `chain`)
2. **Track it**: poll `/api/relay/runs/{id}/status` or connect to the WebSocket `/api/relay/stream/{id}`
3. **Read results**: GET `/api/relay/runs/{id}/results`, or the rendered `/report`

Per-agent failures are reported inside the results and never fail the run.
        ",
        version = "0.1.0",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(
        crate::routes::runs::start_run,
        crate::routes::runs::list_runs,
        crate::routes::runs::run_status,
        crate::routes::runs::run_results,
        crate::routes::runs::run_report,
        crate::routes::runs::stop_run,
        crate::routes::runs::aggregate_run,
        crate::routes::agents::list_agents,
        crate::routes::agents::chat,
        crate::routes::agents::batch_chat,
        crate::routes::agents::compatibility,
        crate::routes::agents::suggest_pair,
        crate::server::health_check
    ),
    components(schemas(
        StartRunResponse,
        ChatRequest,
        BatchChatRequest,
        BatchChatResponse,
        CompatibilityRequest,
        SuggestPairRequest,
        AggregateRequest,
        AggregateResponse,
        AgentsResponse,
        HealthResponse,
        ErrorResponse,
        RunRequest,
        Strategy,
        SessionStatus,
        ReportFormat,
        StatusView,
        ResultsView,
        SessionSummary,
        AgentDescriptor,
        AgentOutcome,
        AgentProfile,
        TurnPhase,
        ChatReply,
        CompatibilityReport,
        CompatibilityLevel,
        PairSuggestion,
        StatusEvent,
        EventSource,
        EventType
    )),
    tags(
        (name = "runs", description = "Run lifecycle"),
        (name = "agents", description = "Agent discovery, direct chat and pairing"),
        (name = "health", description = "System health and status")
    )
)]
pub struct ApiDoc;
