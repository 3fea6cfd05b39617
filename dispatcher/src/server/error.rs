use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::error::job::JobError;
use crate::server::types::ApiResponse;

/// Errors returned by the job routes, rendered as `{ "success": false, "message": ... }`.
#[derive(Error, Debug)]
pub enum JobRouteError {
    #[error("Invalid job ID: {0}")]
    InvalidId(String),

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Invalid job status: {0}")]
    InvalidStatus(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Processing error: {0}")]
    ProcessingError(String),
}

impl JobRouteError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            JobRouteError::InvalidId(_) | JobRouteError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            JobRouteError::NotFound(_) => StatusCode::NOT_FOUND,
            JobRouteError::InvalidStatus(_) => StatusCode::CONFLICT,
            JobRouteError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            JobRouteError::ProcessingError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JobError> for JobRouteError {
    fn from(error: JobError) -> Self {
        match error {
            JobError::JobNotFound { .. } | JobError::FamilyNotServed(_) => JobRouteError::NotFound(error.to_string()),
            JobError::InvalidStatus { .. } => JobRouteError::InvalidStatus(error.to_string()),
            JobError::JobTypeMismatch { .. } => JobRouteError::InvalidBody(error.to_string()),
            other => JobRouteError::ProcessingError(other.to_string()),
        }
    }
}

impl IntoResponse for JobRouteError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(ApiResponse::error(self.to_string()))).into_response()
    }
}
