// Assignment error taxonomy
// Everything here except NotifierFailure is returned synchronously to the
// caller as a typed failure; nothing is retried inside the core.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use super::ports::StoreError;

#[derive(Debug, Error)]
pub enum AssignmentError {
    /// No schedule row for the given id
    #[error("schedule not found")]
    NotFound,
    /// The acting collector is not the current proposed holder
    #[error("collector is not the proposed holder of this schedule")]
    NotEligible,
    /// The assignment was already confirmed (double accept/decline)
    #[error("assignment already resolved")]
    AlreadyResolved,
    /// Schedule is in a terminal status and no longer awaits a response
    #[error("schedule status does not allow a collector response")]
    InvalidState,
    /// Empty or missing decline reason
    #[error("a non-empty decline reason is required")]
    InvalidReason,
    /// The schedule row changed between read and write; caller may re-fetch
    /// and resubmit
    #[error("schedule was modified concurrently, retry")]
    Conflict,
    /// Candidate lookup failed outright
    #[error("collector directory unavailable")]
    DirectoryUnavailable,
    #[error("schedule store error: {0}")]
    Store(String),
}

impl AssignmentError {
    /// Stable machine-readable code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            AssignmentError::NotFound => "not_found",
            AssignmentError::NotEligible => "not_eligible",
            AssignmentError::AlreadyResolved => "already_resolved",
            AssignmentError::InvalidState => "invalid_state",
            AssignmentError::InvalidReason => "invalid_reason",
            AssignmentError::Conflict => "conflict",
            AssignmentError::DirectoryUnavailable => "directory_unavailable",
            AssignmentError::Store(_) => "store_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AssignmentError::NotFound => StatusCode::NOT_FOUND,
            AssignmentError::NotEligible => StatusCode::FORBIDDEN,
            AssignmentError::AlreadyResolved | AssignmentError::Conflict => StatusCode::CONFLICT,
            AssignmentError::InvalidState => StatusCode::UNPROCESSABLE_ENTITY,
            AssignmentError::InvalidReason => StatusCode::UNPROCESSABLE_ENTITY,
            AssignmentError::DirectoryUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AssignmentError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AssignmentError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::VersionConflict => AssignmentError::Conflict,
            StoreError::RowMissing => AssignmentError::NotFound,
            StoreError::Backend(msg) => AssignmentError::Store(msg),
        }
    }
}

impl IntoResponse for AssignmentError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.code(), "message": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}
