use chrono::Utc;
use dispatcher_job_client::types::RecentJobsResponse;
use opentelemetry::KeyValue;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::core::client::database::DatabaseError;
use crate::core::client::queue::OutboundMessage;
use crate::core::config::Config;
use crate::error::job::{JobError, JobResult};
use crate::types::jobs::job_item::JobItem;
use crate::types::jobs::job_updates::JobTransition;
use crate::types::queue::JobQueueMessage;
use crate::types::{JobStatus, JobType};
use crate::utils::metrics::DISPATCHER_METRICS;

/// Job operations shared by the REST routes and the CLI.
pub struct JobService;

impl JobService {
    /// Records a new `queued` job and publishes it to its family's queue.
    ///
    /// Nothing is published if the record cannot be written. If publishing
    /// fails after the write, the record is moved to `failed` so it does not
    /// sit in `queued` forever.
    #[tracing::instrument(skip(input_data, config), fields(job_id = tracing::field::Empty), err)]
    pub async fn submit(job_type: JobType, input_data: Value, config: &Config) -> JobResult<JobItem> {
        let family = job_type.family();
        let topology = config.family(family).ok_or(JobError::FamilyNotServed(family))?;

        let job = JobItem::create(job_type, input_data, Utc::now());
        tracing::Span::current().record("job_id", tracing::field::display(job.id));
        let body = JobQueueMessage { job_id: job.id, job_type, payload: job.input_data.clone() }.to_bytes()?;

        let job = config.database().create_job(job).await?;

        let message = OutboundMessage::persistent(&topology.binding.exchange, &topology.binding.routing_key, body)
            .with_retry_count(0);
        if let Err(publish_error) = config.broker().publish(message).await {
            error!(error = %publish_error, "Failed to publish job, marking it failed");
            let reason = format!("Failed to queue job: {publish_error}");
            match config.database().compare_and_swap_status(job.id, JobStatus::Queued, JobTransition::fail(&reason)).await
            {
                Ok(_) => DISPATCHER_METRICS.jobs_failed.add(1, &[KeyValue::new("job_type", job_type.to_string())]),
                Err(e) => error!(error = %e, "Could not mark unpublished job as failed"),
            }
            return Err(JobError::PublishFailed { id: job.id, reason: publish_error.to_string() });
        }

        DISPATCHER_METRICS.jobs_submitted.add(1, &[KeyValue::new("job_type", job_type.to_string())]);
        info!(queue = %topology.queue.name, "Job queued");
        Ok(job)
    }

    /// Moves a non-terminal job to `cancelled`.
    ///
    /// Retries while a worker moves the job between non-terminal states; once
    /// the job is terminal the cancel is refused.
    #[tracing::instrument(skip(config), err)]
    pub async fn cancel(job_id: Uuid, config: &Config) -> JobResult<JobItem> {
        loop {
            let job = Self::get_job(job_id, config).await?;
            if job.status.is_terminal() {
                return Err(JobError::InvalidStatus { id: job_id, job_status: job.status });
            }

            match config.database().compare_and_swap_status(job_id, job.status, JobTransition::Cancel).await {
                Ok(cancelled) => {
                    DISPATCHER_METRICS.jobs_cancelled.add(1, &[KeyValue::new("job_type", job.job_type.to_string())]);
                    info!(previous = %job.status, "Job cancelled");
                    return Ok(cancelled);
                }
                Err(DatabaseError::StatusMismatch { actual, .. }) => {
                    warn!(expected = %job.status, %actual, "Job changed while cancelling, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn get_job(job_id: Uuid, config: &Config) -> JobResult<JobItem> {
        config.database().get_job_by_id(job_id).await?.ok_or(JobError::JobNotFound { id: job_id })
    }

    /// Active jobs plus jobs that finished within the configured window.
    pub async fn recent_jobs(config: &Config) -> JobResult<RecentJobsResponse> {
        let params = config.server_config();
        let window = chrono::Duration::from_std(params.recent_window).unwrap_or(chrono::Duration::days(1));
        let since = Utc::now() - window;

        let active = config.database().get_active_jobs(Some(params.active_limit)).await?;
        let recent = config.database().get_recent_terminal_jobs(since, Some(params.recent_limit)).await?;

        Ok(RecentJobsResponse {
            active_jobs: active.iter().map(JobItem::to_summary).collect(),
            recent_jobs: recent.iter().map(JobItem::to_summary).collect(),
            credits_info: None,
        })
    }
}
