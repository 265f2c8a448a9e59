//! HTTP error handling and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::SchedulingError;

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Invalid request (validation error)
    BadRequest(String),
    /// Domain error from the scheduling core
    Scheduling(SchedulingError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", msg))
            }
            AppError::Scheduling(e) => {
                let status = match &e {
                    SchedulingError::InvalidTimeRange { .. }
                    | SchedulingError::InvalidRecurrenceConfig { .. } => StatusCode::BAD_REQUEST,
                    SchedulingError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
                    SchedulingError::NotFound { .. } => StatusCode::NOT_FOUND,
                    SchedulingError::OutsideAvailability { .. }
                    | SchedulingError::UnavailableException { .. }
                    | SchedulingError::TeacherDoubleBooked { .. }
                    | SchedulingError::StudentDoubleBooked { .. }
                    | SchedulingError::InvalidStatusTransition { .. }
                    | SchedulingError::ConcurrencyConflict { .. } => StatusCode::CONFLICT,
                    SchedulingError::Repository(re) if re.is_not_found() => StatusCode::NOT_FOUND,
                    SchedulingError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };

                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!("internal error serving request: {}", e);
                }

                let mut body = ApiError::new(e.code(), e.to_string());
                if e.is_retryable() {
                    body = body.with_details("retryable=true");
                }
                (status, body)
            }
        };

        (status, Json(error)).into_response()
    }
}

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        AppError::Scheduling(err)
    }
}

impl From<crate::db::repository::RepositoryError> for AppError {
    fn from(err: crate::db::repository::RepositoryError) -> Self {
        AppError::Scheduling(SchedulingError::Repository(err))
    }
}
