//! Service error types.
//!
//! Errors are categorized by who caused them:
//!
//! | Category | Variants | Surfaced as |
//! |----------|----------|-------------|
//! | **Caller** | `ComputerNotFound`, `JobNotFound` | 404 |
//! | **Request** | `InvalidPayload` | 422 |
//! | **Waiting** | `Timeout` | returned to in-process callers only |
//! | **Config** | `Configuration` | startup failure |
//! | **Internal** | `Internal` | 500 |
//!
//! Failures that happen inside a job (bad QASM, executor faults) are never
//! errors of this type. They are recorded on the job as a `Failed` status and
//! the client learns about them by polling.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Errors that can occur in service operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServerError {
    // ── Caller errors ────────────────────────────────────────────────
    /// No computer with this name is registered.
    #[error("No such computer: {0}")]
    ComputerNotFound(String),

    /// No job with this id was ever created.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// The job request is well-formed but exceeds a server limit.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    // ── Waiting ──────────────────────────────────────────────────────
    /// Timed out waiting for a job to reach a terminal state.
    #[error("Timeout waiting for job {0}")]
    Timeout(String),

    // ── Config errors ────────────────────────────────────────────────
    /// Invalid server configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ── Internal errors ──────────────────────────────────────────────
    /// An internal invariant was violated (e.g. a job id collision).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns `true` if the error means the requested resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ComputerNotFound(_) | Self::JobNotFound(_))
    }

    /// HTTP status code used when this error crosses the API boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ComputerNotFound(_) | Self::JobNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidPayload(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Configuration(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short client-facing message for the `detail` field.
    fn detail(&self) -> String {
        match self {
            Self::ComputerNotFound(_) => "No such computer".to_string(),
            Self::JobNotFound(_) => "Job not found".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "detail": self.detail() }))).into_response()
    }
}

/// Result type for service operations.
pub type ServerResult<T> = Result<T, ServerError>;
