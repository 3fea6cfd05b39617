pub mod error;
pub mod memory;
pub mod mongodb;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
pub use error::DatabaseError;
use uuid::Uuid;

use crate::types::jobs::job_item::JobItem;
use crate::types::jobs::job_updates::JobTransition;
use crate::types::JobStatus;

pub const JOBS_COLLECTION: &str = "jobs";

/// Trait defining job record storage
///
/// Every status write is a compare-and-swap on the current status. Callers
/// read the record, decide on a transition, and pass the status they saw as
/// `expected`; a concurrent writer makes the call fail with
/// [`DatabaseError::StatusMismatch`] instead of being overwritten.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// create_job - Persist a new job. Fails if the id is already taken.
    async fn create_job(&self, job: JobItem) -> Result<JobItem, DatabaseError>;
    /// get_job_by_id - Get a job by its ID
    async fn get_job_by_id(&self, id: Uuid) -> Result<Option<JobItem>, DatabaseError>;
    /// compare_and_swap_status - Apply `transition` only if the job is still in `expected`
    async fn compare_and_swap_status(
        &self,
        id: Uuid,
        expected: JobStatus,
        transition: JobTransition,
    ) -> Result<JobItem, DatabaseError>;
    /// update_progress - Record progress of a job that is `processing`
    async fn update_progress(
        &self,
        id: Uuid,
        percentage: f64,
        message: Option<String>,
    ) -> Result<JobItem, DatabaseError>;
    /// get_active_jobs - Queued and processing jobs, newest first
    async fn get_active_jobs(&self, limit: Option<i64>) -> Result<Vec<JobItem>, DatabaseError>;
    /// get_recent_terminal_jobs - Jobs that reached a terminal state at or after `since`, most recent first
    async fn get_recent_terminal_jobs(
        &self,
        since: DateTime<Utc>,
        limit: Option<i64>,
    ) -> Result<Vec<JobItem>, DatabaseError>;
    async fn health_check(&self) -> Result<(), DatabaseError>;
}

/// Builds the record a successful compare-and-swap would store.
pub(crate) fn next_state(
    current: &JobItem,
    expected: JobStatus,
    transition: &JobTransition,
    now: DateTime<Utc>,
) -> Result<JobItem, DatabaseError> {
    if current.status != expected {
        return Err(DatabaseError::StatusMismatch { id: current.id, expected, actual: current.status });
    }
    let mut next = current.clone();
    next.apply(transition, now)?;
    Ok(next)
}
