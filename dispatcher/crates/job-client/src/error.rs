use reqwest::StatusCode;
use serde_json::Value;

/// Errors returned by [`crate::JobsApi`] calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{operation}: unauthorized")]
    Unauthorized { operation: &'static str },

    #[error("{operation}: forbidden")]
    Forbidden { operation: &'static str },

    #[error("{operation}: not found")]
    NotFound { operation: &'static str },

    #[error("{operation}: server error: {message}")]
    ServerError { operation: &'static str, message: String },

    #[error("{operation}: request failed with status {status}: {message}")]
    Http { operation: &'static str, status: StatusCode, message: String },

    #[error("{operation}: network error: {source}")]
    Network {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation}: failed to decode response: {message}")]
    Decode { operation: &'static str, message: String },

    #[error("invalid endpoint url: {0}")]
    Url(String),

    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    /// Builds the error for a non-success response, pulling a message out of
    /// the body when there is one.
    pub fn from_status(operation: &'static str, status: StatusCode, body: &str) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized { operation },
            StatusCode::FORBIDDEN => ApiError::Forbidden { operation },
            StatusCode::NOT_FOUND => ApiError::NotFound { operation },
            StatusCode::INTERNAL_SERVER_ERROR => {
                ApiError::ServerError { operation, message: extract_message(status, body) }
            }
            _ => ApiError::Http { operation, status, message: extract_message(status, body) },
        }
    }

    pub fn from_reqwest_error(operation: &'static str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ApiError::Decode { operation, message: err.to_string() };
        }
        match err.status() {
            Some(status) => ApiError::from_status(operation, status, ""),
            None => ApiError::Network { operation, source: err },
        }
    }

    /// Message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Unauthorized { .. } => "Your session has expired. Please sign in again.".to_string(),
            ApiError::Forbidden { .. } => "You do not have permission to perform this action.".to_string(),
            ApiError::NotFound { .. } => "The requested job could not be found.".to_string(),
            ApiError::ServerError { .. } => "The server encountered an internal error. Please try again later.".to_string(),
            ApiError::Http { message, .. } => message.clone(),
            ApiError::Network { .. } => "Unable to reach the server. Check your connection.".to_string(),
            ApiError::Decode { .. } => "The server returned an unexpected response.".to_string(),
            ApiError::Url(_) => "The server address is invalid.".to_string(),
            ApiError::Cancelled => "The request was cancelled.".to_string(),
        }
    }

    /// Whether the poller should expect a later attempt to succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network { .. } | ApiError::ServerError { .. } => true,
            ApiError::Http { status, .. } => status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS,
            _ => false,
        }
    }
}

fn extract_message(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error", "detail"] {
            match map.get(key) {
                Some(Value::String(s)) if !s.trim().is_empty() => return s.clone(),
                Some(Value::Object(inner)) => {
                    if let Some(Value::String(s)) = inner.get("message") {
                        return s.clone();
                    }
                }
                _ => {}
            }
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() <= 200 && !trimmed.starts_with('{') && !trimmed.starts_with('<') {
        return trimmed.to_string();
    }

    match status.canonical_reason() {
        Some(reason) => format!("Request failed with status {} ({})", status.as_u16(), reason),
        None => format!("Request failed with status {}", status.as_u16()),
    }
}
