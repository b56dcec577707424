//! Error types for the chat agent

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, Error>;

/// Agent system errors
#[derive(Debug, Error)]
pub enum Error {
    /// Missing credential, unreadable `.env`, malformed setting
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No persisted index is available
    #[error("Index not found in '{0}'. Please run `kb-chat generate` to index the data first.")]
    IndexNotFound(String),

    /// Failure while the agent was invoking the model or its tool
    #[error("Agent execution failed: {message}")]
    AgentExecution {
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Persisted index is corrupt or incompatible
    #[error("Index error: {0}")]
    Index(String),

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// LLM error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Provider answered with a non-success HTTP status
    #[error("{provider} API error (HTTP {status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    /// Request payload rejected at the boundary
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create an index error
    pub fn index(message: impl Into<String>) -> Self {
        Self::Index(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Agent failure without an underlying cause (e.g. iteration limit)
    pub fn agent(message: impl Into<String>) -> Self {
        Self::AgentExecution {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a failure raised while the agent was running.
    ///
    /// Already-wrapped errors are returned as is.
    pub fn agent_failure(err: Error) -> Self {
        match err {
            Error::AgentExecution { .. } => err,
            other => Self::AgentExecution {
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }

    /// Stable snake_case name of the error variant
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "configuration_error",
            Error::IndexNotFound(_) => "index_not_found",
            Error::AgentExecution { .. } => "agent_execution_error",
            Error::Index(_) => "index_error",
            Error::Embedding(_) => "embedding_error",
            Error::Llm(_) => "llm_error",
            Error::Api { .. } => "api_error",
            Error::InvalidInput(_) => "invalid_input",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
            Error::Http(_) => "http_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Whether a provider call failing with this error may be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            Error::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::IndexNotFound(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::AgentExecution { .. } => StatusCode::BAD_GATEWAY,
            Error::Index(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Embedding(_) => StatusCode::BAD_GATEWAY,
            Error::Llm(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Api { .. } => StatusCode::BAD_GATEWAY,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Json(_) => StatusCode::BAD_REQUEST,
            Error::Http(_) => StatusCode::BAD_GATEWAY,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": {
                "type": self.kind(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
