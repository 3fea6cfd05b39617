use thiserror::Error;
use uuid::Uuid;

use crate::types::jobs::job_updates::TransitionError;
use crate::types::JobStatus;

#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The stored status no longer matches what the caller expected.
    #[error("Job {id} was expected in status {expected} but is {actual}")]
    StatusMismatch { id: Uuid, expected: JobStatus, actual: JobStatus },

    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error("Item already exists: {0}")]
    ItemAlreadyExists(String),

    #[error("Invalid job transition: {0}")]
    InvalidTransition(#[from] TransitionError),

    #[error("Update failed: {0}")]
    UpdateFailed(String),

    #[error("Mongo error: {0}")]
    MongoError(#[from] mongodb::error::Error),

    #[error("Bson serialization error: {0}")]
    BsonSerError(#[from] mongodb::bson::ser::Error),
}
