//! # PromptLink Relay API Server
//!
//! REST and WebSocket front end for multi-model runs.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   REST Endpoints    │ <- /api/relay/runs, /api/agents, /health
//! ├─────────────────────┤
//! │   WebSocket Stream  │ <- /api/relay/stream/{id}
//! ├─────────────────────┤
//! │    Orchestrator     │ <- validation, background runs, session store
//! ├─────────────────────┤
//! │  Runners / Invoker  │ <- panel, pairs, chain; chat completions
//! └─────────────────────┘
//! ```
//!
//! ## Usage
//!
//! 1. **POST** `/api/relay/runs` starts a run and returns its session id
//! 2. Poll `/api/relay/runs/{id}/status` or connect to `/api/relay/stream/{id}`
//! 3. Read `/api/relay/runs/{id}/results` or the rendered `/report`
//!
//! Errors are returned as `ErrorResponse` JSON with a machine-readable code.

pub mod error;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use server::{build_router, AppState, RelayServer};
pub use types::*;
