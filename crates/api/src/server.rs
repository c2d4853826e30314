//! HTTP server wiring: shared state, router and lifecycle

use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue,
    },
    middleware,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};
use utoipa::OpenApi;

use promptlink_common::SystemConfig;
use promptlink_network::Orchestrator;

use crate::{
    middleware::{get_tracing_layer, logging_middleware},
    openapi::ApiDoc,
    routes::{agents, runs, stream},
    types::HealthResponse,
};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            started_at: Instant::now(),
        }
    }
}

/// Build the full router, including middleware
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.orchestrator.config().server.cors_origins);

    Router::new()
        .route("/api/relay/runs", post(runs::start_run).get(runs::list_runs))
        .route("/api/relay/runs/:id/status", get(runs::run_status))
        .route("/api/relay/runs/:id/results", get(runs::run_results))
        .route("/api/relay/runs/:id/report", get(runs::run_report))
        .route("/api/relay/runs/:id/stop", post(runs::stop_run))
        .route("/api/relay/runs/:id/aggregate", post(runs::aggregate_run))
        .route("/api/relay/stream/:id", get(stream::websocket_handler))
        .route("/api/agents", get(agents::list_agents))
        .route("/api/agents/chat", post(agents::chat))
        .route("/api/agents/batch-chat", post(agents::batch_chat))
        .route("/api/agents/compatibility", post(agents::compatibility))
        .route("/api/agents/suggest-pair", post(agents::suggest_pair))
        .route("/health", get(health_check))
        .route("/api-doc/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(logging_middleware))
        .layer(get_tracing_layer())
        .layer(cors)
        .with_state(state)
}

/// An empty origin list allows any origin
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    let layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    if allowed.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(allowed)
    }
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Server is healthy", body = HealthResponse)),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        sessions: state.orchestrator.store().len(),
        features: vec![
            "panel".to_string(),
            "pairs".to_string(),
            "chain".to_string(),
            "moderated_chain".to_string(),
            "aggregation".to_string(),
            "pair_compatibility".to_string(),
            "websocket_streaming".to_string(),
        ],
        timestamp: Utc::now(),
    })
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// The relay HTTP server
pub struct RelayServer {
    orchestrator: Arc<Orchestrator>,
}

impl RelayServer {
    /// Build the orchestrator from configuration
    pub fn new(config: SystemConfig) -> Result<Self> {
        let orchestrator = Orchestrator::from_config(config).context("failed to build orchestrator")?;
        Ok(Self::with_orchestrator(Arc::new(orchestrator)))
    }

    pub fn with_orchestrator(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    pub fn router(&self) -> Router {
        build_router(AppState::new(self.orchestrator.clone()))
    }

    /// Serve until ctrl-c
    pub async fn run(self) -> Result<()> {
        let server = &self.orchestrator.config().server;
        let addr: SocketAddr = format!("{}:{}", server.host, server.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", server.host, server.port))?;

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind to {}", addr))?;

        let sweeper = tokio::spawn(sweep_sessions(self.orchestrator.clone()));

        info!(
            address = %addr,
            agents = self.orchestrator.registry().all_agents().len(),
            "Relay server listening"
        );

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("server error");

        sweeper.abort();
        info!("Relay server stopped");
        result
    }
}

/// Periodically drop terminal sessions past their TTL
async fn sweep_sessions(orchestrator: Arc<Orchestrator>) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    interval.tick().await;
    loop {
        interval.tick().await;
        let removed = orchestrator.cleanup_expired_sessions().await;
        if removed > 0 {
            debug!(removed, "Swept expired sessions");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
