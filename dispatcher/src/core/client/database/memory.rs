use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{next_state, DatabaseError, JobRepository};
use crate::types::jobs::job_item::JobItem;
use crate::types::jobs::job_updates::JobTransition;
use crate::types::JobStatus;

/// Job store kept in process memory.
///
/// Used by single-process deployments and tests. The write lock makes each
/// compare-and-swap atomic.
#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<Uuid, JobItem>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

fn truncate(mut jobs: Vec<JobItem>, limit: Option<i64>) -> Vec<JobItem> {
    if let Some(limit) = limit {
        jobs.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
    }
    jobs
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create_job(&self, job: JobItem) -> Result<JobItem, DatabaseError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(DatabaseError::ItemAlreadyExists(format!("Job already exists with id {}", job.id)));
        }
        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get_job_by_id(&self, id: Uuid) -> Result<Option<JobItem>, DatabaseError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn compare_and_swap_status(
        &self,
        id: Uuid,
        expected: JobStatus,
        transition: JobTransition,
    ) -> Result<JobItem, DatabaseError> {
        let mut jobs = self.jobs.write().await;
        let current = jobs.get_mut(&id).ok_or(DatabaseError::JobNotFound(id))?;
        let next = next_state(current, expected, &transition, Utc::now())?;
        *current = next.clone();
        Ok(next)
    }

    async fn update_progress(
        &self,
        id: Uuid,
        percentage: f64,
        message: Option<String>,
    ) -> Result<JobItem, DatabaseError> {
        let mut jobs = self.jobs.write().await;
        let current = jobs.get_mut(&id).ok_or(DatabaseError::JobNotFound(id))?;
        current.set_progress(percentage, message, Utc::now())?;
        Ok(current.clone())
    }

    async fn get_active_jobs(&self, limit: Option<i64>) -> Result<Vec<JobItem>, DatabaseError> {
        let mut active: Vec<JobItem> =
            self.jobs.read().await.values().filter(|job| job.status.is_active()).cloned().collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(truncate(active, limit))
    }

    async fn get_recent_terminal_jobs(
        &self,
        since: DateTime<Utc>,
        limit: Option<i64>,
    ) -> Result<Vec<JobItem>, DatabaseError> {
        let mut recent: Vec<JobItem> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.status.is_terminal() && job.updated_at >= since)
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(truncate(recent, limit))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

