use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::Utc;
use mockall::predicate::eq;
use rstest::*;
use uuid::Uuid;

use crate::core::client::database::{DatabaseError, MockJobRepository};
use crate::core::client::queue::HeaderValue;
use crate::error::job::JobError;
use crate::tests::common::{build_job_item, spot_payload};
use crate::tests::config::TestConfigBuilder;
use crate::types::jobs::job_updates::JobTransition;
use crate::types::queue::{JobQueueMessage, RETRY_COUNT_HEADER};
use crate::types::{JobFamily, JobStatus, JobType};
use crate::worker::service::JobService;

#[rstest]
#[tokio::test]
async fn submit_records_then_publishes_to_the_family_queue() {
    let services = TestConfigBuilder::new().build().await;

    let job = JobService::submit(JobType::SpotSimulation, spot_payload(), &services.config).await.unwrap();

    assert_eq!(job.status, JobStatus::Queued);
    let stored = services.config.database().get_job_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.input_data, spot_payload());

    let messages = services.broker.messages("spot-processing");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].routing_key, "spot.*");
    assert_eq!(messages[0].headers.get(RETRY_COUNT_HEADER), Some(&HeaderValue::Int(0)));
    let body = JobQueueMessage::parse(&messages[0].body).unwrap();
    assert_eq!(body, JobQueueMessage { job_id: job.id, job_type: JobType::SpotSimulation, payload: spot_payload() });
    assert_eq!(services.broker.depth("solver-processing"), 0);
}

#[rstest]
#[case(JobType::SolverSimulation)]
#[case(JobType::SolverAnalysis)]
#[tokio::test]
async fn solver_types_share_the_solver_queue(#[case] job_type: JobType) {
    let services = TestConfigBuilder::new().build().await;

    JobService::submit(job_type, spot_payload(), &services.config).await.unwrap();

    assert_eq!(services.broker.depth("solver-processing"), 1);
    assert_eq!(services.broker.depth("spot-processing"), 0);
}

#[rstest]
#[tokio::test]
async fn storage_failure_publishes_nothing() {
    let mut database = MockJobRepository::new();
    database.expect_create_job().times(1).returning(|_| Err(DatabaseError::UpdateFailed("disk full".into())));
    let services = TestConfigBuilder::new().configure_database(Arc::new(database)).build().await;

    let result = JobService::submit(JobType::SpotSimulation, spot_payload(), &services.config).await;

    assert_matches!(result, Err(JobError::DatabaseError(DatabaseError::UpdateFailed(_))));
    assert_eq!(services.broker.depth("spot-processing"), 0);
}

#[rstest]
#[tokio::test]
async fn publish_failure_marks_the_job_failed() {
    let services = TestConfigBuilder::new().build().await;
    services.broker.fail_next_publish();

    let result = JobService::submit(JobType::SpotSimulation, spot_payload(), &services.config).await;

    let id = assert_matches!(result, Err(JobError::PublishFailed { id, .. }) => id);
    let stored = services.config.database().get_job_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.error_message.unwrap().starts_with("Failed to queue job"));
    assert_eq!(services.broker.depth("spot-processing"), 0);
}

#[rstest]
#[tokio::test]
async fn unserved_family_is_refused() {
    let services = TestConfigBuilder::new().configure_families(&[JobFamily::Spot]).build().await;

    let result = JobService::submit(JobType::SolverAnalysis, spot_payload(), &services.config).await;

    assert_matches!(result, Err(JobError::FamilyNotServed(JobFamily::Solver)));
    assert!(services.database.unwrap().is_empty().await);
}

#[rstest]
#[case(JobStatus::Queued)]
#[case(JobStatus::Processing)]
#[tokio::test]
async fn cancel_moves_active_jobs_to_cancelled(#[case] status: JobStatus) {
    let services = TestConfigBuilder::new().build().await;
    let job = build_job_item(JobType::SolverSimulation, status, Utc::now());
    services.config.database().create_job(job.clone()).await.unwrap();

    let cancelled = JobService::cancel(job.id, &services.config).await.unwrap();

    assert_eq!(cancelled.status, JobStatus::Cancelled);
    assert!(cancelled.completed_at.is_some());
}

#[rstest]
#[case(JobStatus::Completed)]
#[case(JobStatus::Failed)]
#[case(JobStatus::Cancelled)]
#[tokio::test]
async fn cancel_refuses_terminal_jobs(#[case] status: JobStatus) {
    let services = TestConfigBuilder::new().build().await;
    let job = build_job_item(JobType::SpotSimulation, status, Utc::now());
    services.config.database().create_job(job.clone()).await.unwrap();

    let result = JobService::cancel(job.id, &services.config).await;

    assert_matches!(result, Err(JobError::InvalidStatus { job_status, .. }) if job_status == status);
}

#[rstest]
#[tokio::test]
async fn cancel_retries_when_a_worker_moves_the_job() {
    let queued = build_job_item(JobType::SpotSimulation, JobStatus::Queued, Utc::now());
    let processing = build_job_item(JobType::SpotSimulation, JobStatus::Processing, Utc::now());
    let id = queued.id;
    let mut cancelled = processing.clone();
    cancelled.apply(&JobTransition::Cancel, Utc::now()).unwrap();

    let mut database = MockJobRepository::new();
    let mut reads = vec![processing.clone(), queued.clone()];
    database.expect_get_job_by_id().with(eq(id)).times(2).returning(move |_| Ok(reads.pop()));
    database
        .expect_compare_and_swap_status()
        .withf(move |job_id, expected, transition| {
            *job_id == id && *expected == JobStatus::Queued && *transition == JobTransition::Cancel
        })
        .times(1)
        .returning(move |id, _, _| {
            Err(DatabaseError::StatusMismatch { id, expected: JobStatus::Queued, actual: JobStatus::Processing })
        });
    database
        .expect_compare_and_swap_status()
        .withf(move |job_id, expected, _| *job_id == id && *expected == JobStatus::Processing)
        .times(1)
        .returning(move |_, _, _| Ok(cancelled.clone()));
    let services = TestConfigBuilder::new().configure_database(Arc::new(database)).build().await;

    let result = JobService::cancel(id, &services.config).await.unwrap();

    assert_eq!(result.status, JobStatus::Cancelled);
}

#[rstest]
#[tokio::test]
async fn cancel_unknown_job_is_not_found() {
    let services = TestConfigBuilder::new().build().await;
    let id = Uuid::new_v4();

    assert_matches!(JobService::cancel(id, &services.config).await, Err(JobError::JobNotFound { id: missing }) if missing == id);
}

#[rstest]
#[tokio::test]
async fn recent_jobs_lists_active_and_finished_jobs() {
    let services = TestConfigBuilder::new().build().await;
    let database = services.config.database();
    let active = build_job_item(JobType::SpotSimulation, JobStatus::Processing, Utc::now());
    let done = build_job_item(JobType::SolverSimulation, JobStatus::Completed, Utc::now());
    database.create_job(active.clone()).await.unwrap();
    database.create_job(done.clone()).await.unwrap();

    let response = JobService::recent_jobs(&services.config).await.unwrap();

    assert_eq!(response.active_jobs.iter().map(|j| j.id).collect::<Vec<_>>(), vec![active.id]);
    assert_eq!(response.recent_jobs.iter().map(|j| j.id).collect::<Vec<_>>(), vec![done.id]);
    assert_eq!(response.recent_jobs[0].status, JobStatus::Completed);
}
