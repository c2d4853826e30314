//! Mapping of orchestration errors onto HTTP responses

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use promptlink_common::{InvokeError, RelayError};

use crate::types::ErrorResponse;

/// Handler error rendered as `(status, ErrorResponse)`
#[derive(Debug)]
pub enum ApiError {
    Relay(RelayError),
    Json(JsonRejection),
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        ApiError::Relay(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Json(rejection)
    }
}

/// HTTP status and error code for an orchestration error
pub fn status_and_code(err: &RelayError) -> (StatusCode, &'static str) {
    match err {
        RelayError::InvalidInput(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_INPUT"),
        RelayError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        RelayError::NoResults(_) => (StatusCode::CONFLICT, "NO_RESULTS"),
        RelayError::InvalidStateTransition { .. } => (StatusCode::CONFLICT, "INVALID_STATE"),
        RelayError::Invoke(invoke) => {
            let status = match invoke {
                InvokeError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
                InvokeError::UpstreamUnavailable { .. } => StatusCode::GATEWAY_TIMEOUT,
                InvokeError::UpstreamError { .. } | InvokeError::MalformedResponse { .. } => {
                    StatusCode::BAD_GATEWAY
                }
            };
            (status, invoke.code())
        }
        RelayError::ConfigValidation { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR")
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Relay(err) => {
                let (status, code) = status_and_code(&err);
                if status.is_server_error() {
                    error!(code, "Request failed: {}", err);
                } else {
                    warn!(code, "Request rejected: {}", err);
                }
                (status, ErrorResponse::new(err.to_string(), code))
            }
            ApiError::Json(rejection) => {
                warn!("Invalid JSON body: {}", rejection.body_text());
                (
                    rejection.status(),
                    ErrorResponse::new(rejection.body_text(), "JSON_PARSE_ERROR"),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
