use axum::response::Response;
use serde::{Deserialize, Serialize};

use super::error::JobRouteError;

/// Path parameter of the `/jobs/:id/...` routes, parsed by the handler so a
/// bad id gets a JSON error instead of axum's plain-text rejection.
#[derive(Deserialize)]
pub struct JobId {
    pub id: String,
}

/// Envelope for responses that carry no job data, and for every error.
#[derive(Serialize, Deserialize, Debug)]
pub struct ApiResponse<T = ()> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiResponse<()> {
    pub fn error(message: String) -> Self {
        Self { success: false, data: None, message: Some(message) }
    }
}

impl<T> ApiResponse<T> {
    pub fn success_with_data(data: T, message: Option<String>) -> Self {
        Self { success: true, data: Some(data), message }
    }

    pub fn success(message: Option<String>) -> Self {
        Self { success: true, data: None, message }
    }
}

pub type JobRouteResult = Result<Response<axum::body::Body>, JobRouteError>;
