use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use jobs::job_router;
use simulate::simulate_router;
use tracing::warn;

use super::error::JobRouteError;
use super::types::{ApiResponse, JobRouteResult};
use crate::core::config::Config;

pub(super) mod jobs;
pub(super) mod simulate;

/// JSON 404 for every path no route matches, including unserved families.
pub async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ApiResponse::error("The requested resource was not found".to_string())))
}

/// Liveness of the broker connection and the job store.
async fn handle_health_request(State(config): State<Arc<Config>>) -> JobRouteResult {
    if let Err(e) = config.database().health_check().await {
        warn!(error = %e, "Job store health check failed");
        return Err(JobRouteError::Unavailable(format!("database: {e}")));
    }
    if let Err(e) = config.broker().health_check().await {
        warn!(error = %e, "Broker health check failed");
        return Err(JobRouteError::Unavailable(format!("broker: {e}")));
    }
    Ok(Json(ApiResponse::<()>::success(Some("ok".to_string()))).into_response())
}

pub(crate) fn server_router(config: Arc<Config>) -> Router {
    Router::new()
        .route("/health", get(handle_health_request).with_state(config.clone()))
        .nest("/jobs", job_router(config.clone()))
        .merge(simulate_router(config))
        .fallback(handler_404)
}
