use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use dispatcher_job_client::types::{SimulateRequest, SubmitJobResponse, SubmittedJob};
use tracing::{error, info};

use super::super::error::JobRouteError;
use super::super::types::JobRouteResult;
use crate::core::config::Config;
use crate::error::job::JobError;
use crate::types::JobFamily;
use crate::worker::service::JobService;

/// Submits a job of `family`. The job type defaults to the family's primary
/// type and must belong to the family when given.
#[tracing::instrument(skip(config, body))]
async fn handle_simulate_request(
    family: JobFamily,
    config: Arc<Config>,
    body: Result<Json<SimulateRequest>, JsonRejection>,
) -> JobRouteResult {
    let Json(request) = body.map_err(|rejection| JobRouteError::InvalidBody(rejection.body_text()))?;

    let job_type = request.job_type.unwrap_or_else(|| family.default_job_type());
    if job_type.family() != family {
        return Err(JobError::JobTypeMismatch { job_type, family }.into());
    }

    match JobService::submit(job_type, request.input_data, &config).await {
        Ok(job) => {
            info!(job_id = %job.id, %job_type, "Job submitted");
            let response =
                SubmitJobResponse { job: SubmittedJob { id: job.id, status: job.status }, credits_info: None };
            Ok((StatusCode::ACCEPTED, Json(response)).into_response())
        }
        Err(e) => {
            error!(error = %e, %job_type, "Failed to submit job");
            Err(e.into())
        }
    }
}

/// `POST /<family>/simulate` for every family this dispatcher serves.
pub fn simulate_router(config: Arc<Config>) -> Router {
    config.topology().families.iter().map(|f| f.family).fold(Router::new(), |router, family| {
        let config = config.clone();
        router.route(
            &format!("/{family}/simulate"),
            post(move |body: Result<Json<SimulateRequest>, JsonRejection>| {
                handle_simulate_request(family, config.clone(), body)
            }),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_paths_are_lowercase() {
        assert_eq!(format!("/{}/simulate", JobFamily::Solver), "/solver/simulate");
    }
}
