pub mod consumer;
pub mod job;

use dispatcher_job_client::ApiError;
use thiserror::Error;

use crate::core::client::compute::ComputeError;
use crate::core::client::database::DatabaseError;
use crate::core::client::queue::QueueError;
use crate::setup::TopologyError;
pub use consumer::ConsumptionError;
pub use job::JobError;

/// Result type for dispatcher operations
pub type DispatcherResult<T> = Result<T, DispatcherError>;

/// Error types for the dispatcher
#[derive(Error, Debug)]
pub enum DispatcherError {
    #[error("Queue error: {0}")]
    QueueCoreError(#[from] QueueError),

    #[error("Database error: {0}")]
    DatabaseCoreError(#[from] DatabaseError),

    #[error("Compute error: {0}")]
    ComputeCoreError(#[from] ComputeError),

    /// Broker state disagrees with the declared topology
    #[error("Topology error: {0}")]
    TopologyError(#[from] TopologyError),

    #[error("Job error: {0}")]
    JobError(#[from] JobError),

    #[error("Consumption error: {0}")]
    ConsumptionError(#[from] ConsumptionError),

    #[error("Job API error: {0}")]
    ApiError(#[from] ApiError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Worker error: {0}")]
    WorkerError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Dispatcher error: {0}")]
    DispatcherAnyHowError(#[from] anyhow::Error),
}
