//! Run lifecycle endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use tracing::{info, instrument};

use promptlink_common::{
    ReportFormat, ResultsView, RunRequest, SessionId, SessionStatus, SessionSummary, StatusView,
};

use crate::{
    error::ApiError,
    server::AppState,
    types::{AggregateRequest, AggregateResponse, ErrorResponse, ReportQuery, StartRunResponse},
};

/// Start a run in the background
///
/// Returns immediately with the session id. Poll the status and results
/// URLs or connect to the stream URL for live events.
#[utoipa::path(
    post,
    path = "/api/relay/runs",
    request_body = RunRequest,
    responses(
        (status = 202, description = "Run accepted", body = StartRunResponse),
        (status = 422, description = "Unusable run configuration", body = ErrorResponse),
    ),
    tag = "runs"
)]
#[instrument(skip(state, payload))]
pub async fn start_run(
    State(state): State<AppState>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StartRunResponse>), ApiError> {
    let Json(request) = payload?;
    let strategy = request.strategy;
    let session_id = state.orchestrator.start_run(request).await?;
    info!(session_id = %session_id, strategy = %strategy, "Run started");

    let base = format!("/api/relay/runs/{}", session_id);
    Ok((
        StatusCode::ACCEPTED,
        Json(StartRunResponse {
            status: SessionStatus::Queued,
            strategy,
            status_url: format!("{}/status", base),
            results_url: format!("{}/results", base),
            stream_url: format!("/api/relay/stream/{}", session_id),
            session_id: session_id.to_string(),
        }),
    ))
}

/// List sessions, newest first
#[utoipa::path(
    get,
    path = "/api/relay/runs",
    responses((status = 200, description = "Session summaries", body = [SessionSummary])),
    tag = "runs"
)]
pub async fn list_runs(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.orchestrator.list_sessions().await)
}

#[utoipa::path(
    get,
    path = "/api/relay/runs/{id}/status",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session status", body = StatusView),
        (status = 404, description = "Unknown session", body = ErrorResponse),
    ),
    tag = "runs"
)]
pub async fn run_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusView>, ApiError> {
    let status = state.orchestrator.status(&SessionId::from_string(id)).await?;
    Ok(Json(status))
}

#[utoipa::path(
    get,
    path = "/api/relay/runs/{id}/results",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Per-agent results", body = ResultsView),
        (status = 404, description = "Unknown session", body = ErrorResponse),
    ),
    tag = "runs"
)]
pub async fn run_results(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ResultsView>, ApiError> {
    let results = state.orchestrator.results(&SessionId::from_string(id)).await?;
    Ok(Json(results))
}

/// Rendered report of a session
#[utoipa::path(
    get,
    path = "/api/relay/runs/{id}/report",
    params(("id" = String, Path, description = "Session id"), ReportQuery),
    responses(
        (status = 200, description = "HTML or Markdown report", body = String, content_type = "text/html"),
        (status = 404, description = "Unknown session", body = ErrorResponse),
        (status = 409, description = "No results yet", body = ErrorResponse),
    ),
    tag = "runs"
)]
pub async fn run_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    let format = query.format.unwrap_or_default();
    let body = state
        .orchestrator
        .report(&SessionId::from_string(id), format)
        .await?;

    Ok(match format {
        ReportFormat::Html => Html(body).into_response(),
        ReportFormat::Markdown => (
            [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
            body,
        )
            .into_response(),
    })
}

/// Request a stop; a no-op for finished sessions
#[utoipa::path(
    post,
    path = "/api/relay/runs/{id}/stop",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Status after the stop request", body = StatusView),
        (status = 404, description = "Unknown session", body = ErrorResponse),
    ),
    tag = "runs"
)]
#[instrument(skip(state))]
pub async fn stop_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusView>, ApiError> {
    let status = state.orchestrator.stop(&SessionId::from_string(id)).await?;
    Ok(Json(status))
}

/// Synchronously aggregate a completed session
#[utoipa::path(
    post,
    path = "/api/relay/runs/{id}/aggregate",
    params(("id" = String, Path, description = "Session id")),
    request_body = AggregateRequest,
    responses(
        (status = 200, description = "Aggregated report", body = AggregateResponse),
        (status = 404, description = "Unknown session", body = ErrorResponse),
        (status = 409, description = "Session not completed or nothing to aggregate", body = ErrorResponse),
        (status = 502, description = "Summarizing model failed", body = ErrorResponse),
    ),
    tag = "runs"
)]
#[instrument(skip(state, payload))]
pub async fn aggregate_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Option<Json<AggregateRequest>>,
) -> Result<Json<AggregateResponse>, ApiError> {
    let model = payload.and_then(|Json(req)| req.model);
    let session_id = SessionId::from_string(id);
    let report = state.orchestrator.aggregate(&session_id, model).await?;
    Ok(Json(AggregateResponse {
        session_id: session_id.to_string(),
        report,
    }))
}
