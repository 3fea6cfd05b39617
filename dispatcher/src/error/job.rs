use thiserror::Error;
use uuid::Uuid;

use crate::core::client::database::DatabaseError;
use crate::core::client::queue::QueueError;
use crate::types::{JobFamily, JobStatus, JobType};

pub type JobResult<T> = Result<T, JobError>;

/// Error types for submitting, cancelling and reading jobs
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Failed to serialize data: {0}")]
    FailedToSerializeData(#[from] serde_json::Error),

    #[error("Queue error: {0}")]
    QueueError(#[from] QueueError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    /// The job was stored but its message never reached the broker. The record is marked failed.
    #[error("Job {id} was recorded but could not be queued: {reason}")]
    PublishFailed { id: Uuid, reason: String },

    /// Indicates the job is in an invalid status for the requested operation
    #[error("Invalid status {job_status} for job with id {id}")]
    InvalidStatus { id: Uuid, job_status: JobStatus },

    #[error("Failed to find job with id {id}")]
    JobNotFound { id: Uuid },

    #[error("Job type {job_type} does not belong to the {family} family")]
    JobTypeMismatch { job_type: JobType, family: JobFamily },

    #[error("Job family {0} is not served by this dispatcher")]
    FamilyNotServed(JobFamily),
}
