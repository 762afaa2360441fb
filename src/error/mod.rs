use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type for gatekeeper operations
pub type Result<T> = std::result::Result<T, GatekeeperError>;

/// Gatekeeper error types
#[derive(Error, Debug)]
pub enum GatekeeperError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session resolution error: {0}")]
    Session(String),

    #[error("Rate limit store error: {0}")]
    Store(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatekeeperError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatekeeperError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatekeeperError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatekeeperError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatekeeperError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatekeeperError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatekeeperError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatekeeperError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatekeeperError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
