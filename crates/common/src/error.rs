use thiserror::Error;

/// Failure of a single model invocation.
///
/// Runners turn these into per-agent outcomes; they never abort a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Upstream unavailable for {model}: {reason}")]
    UpstreamUnavailable { model: String, reason: String },

    #[error("Upstream error for {model}: HTTP {status}: {body}")]
    UpstreamError { model: String, status: u16, body: String },

    #[error("Malformed response from {model}: {reason}")]
    MalformedResponse { model: String, reason: String },
}

impl InvokeError {
    pub fn unavailable(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            model: model.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            model: model.into(),
            reason: reason.into(),
        }
    }

    /// Machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            Self::UpstreamError { .. } => "UPSTREAM_ERROR",
            Self::MalformedResponse { .. } => "MALFORMED_RESPONSE",
        }
    }
}

/// Core error type for orchestration failures
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RelayError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration validation failed: {details}")]
    ConfigValidation { details: String },

    #[error("Resource not found: {resource_type}:{resource_id}")]
    NotFound { resource_type: String, resource_id: String },

    #[error("No results: {0}")]
    NoResults(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl RelayError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn session_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: "session".to_string(),
            resource_id: id.into(),
        }
    }

    pub fn agent_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: "agent".to_string(),
            resource_id: id.into(),
        }
    }

    /// Check if error is caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::NotFound { .. }
                | Self::NoResults(_)
                | Self::InvalidStateTransition { .. }
        )
    }
}

pub type RelayResult<T> = std::result::Result<T, RelayError>;
