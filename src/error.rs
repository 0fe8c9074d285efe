//! Error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Failure of the external chat-completion call.
///
/// The controller does not distinguish between the variants; they exist for
/// logging only.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("chat endpoint returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// Reply body could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid endpoint URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Errors surfaced by the HTTP API.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("workspace not found: {0}")]
    WorkspaceNotFound(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("unknown persona: {0}")]
    UnknownPersona(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::WorkspaceNotFound(_) | Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::UnknownPersona(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::WorkspaceNotFound("w".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::UnknownPersona("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
