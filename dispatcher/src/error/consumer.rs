use thiserror::Error;
use uuid::Uuid;

use crate::core::client::database::DatabaseError;
use crate::core::client::queue::QueueError;

/// Errors raised while handling a single delivery
#[derive(Error, Debug)]
pub enum ConsumptionError {
    #[error("No job record for id {0}")]
    UnknownJob(Uuid),

    #[error("Failed to consume from queue {queue}: {error_msg}")]
    FailedToConsumeFromQueue { queue: String, error_msg: String },

    #[error("Queue error: {0}")]
    QueueError(#[from] QueueError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
}
