use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use dispatcher_job_client::types::{JobDetailsResponse, SubmittedJob};
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::super::error::JobRouteError;
use super::super::types::{ApiResponse, JobId, JobRouteResult};
use crate::core::config::Config;
use crate::worker::service::JobService;

fn parse_job_id(id: &str) -> Result<Uuid, JobRouteError> {
    Uuid::parse_str(id).map_err(|_| JobRouteError::InvalidId(id.to_string()))
}

/// Active jobs and jobs finished within the recent window.
#[instrument(skip(config))]
async fn handle_recent_jobs_request(State(config): State<Arc<Config>>) -> JobRouteResult {
    match JobService::recent_jobs(&config).await {
        Ok(response) => Ok(Json(response).into_response()),
        Err(e) => {
            error!(error = %e, "Failed to list recent jobs");
            Err(e.into())
        }
    }
}

#[instrument(skip(config), fields(job_id = %id))]
async fn handle_job_details_request(Path(JobId { id }): Path<JobId>, State(config): State<Arc<Config>>) -> JobRouteResult {
    let job_id = parse_job_id(&id)?;
    let job = JobService::get_job(job_id, &config).await?;
    Ok(Json(JobDetailsResponse { job: job.to_detail() }).into_response())
}

#[instrument(skip(config), fields(job_id = %id))]
async fn handle_cancel_job_request(Path(JobId { id }): Path<JobId>, State(config): State<Arc<Config>>) -> JobRouteResult {
    let job_id = parse_job_id(&id)?;

    match JobService::cancel(job_id, &config).await {
        Ok(job) => {
            info!("Job cancelled through the API");
            Ok(Json(ApiResponse::success_with_data(
                SubmittedJob { id: job.id, status: job.status },
                Some(format!("Job with id {} cancelled", id)),
            ))
            .into_response())
        }
        Err(e) => {
            error!(error = %e, "Failed to cancel job");
            Err(e.into())
        }
    }
}

pub fn job_router(config: Arc<Config>) -> Router {
    Router::new()
        .route("/recent", get(handle_recent_jobs_request))
        .route("/:id/details", get(handle_job_details_request))
        .route("/:id/cancel", post(handle_cancel_job_request))
        .with_state(config)
}
