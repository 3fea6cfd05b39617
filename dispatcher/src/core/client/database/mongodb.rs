use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{
    FindOneAndReplaceOptions, FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument,
};
use mongodb::{bson, Client, Collection, Database, IndexModel};
use opentelemetry::KeyValue;
use strum::IntoEnumIterator;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{next_state, DatabaseError, JobRepository, JOBS_COLLECTION};
use crate::types::jobs::job_item::JobItem;
use crate::types::jobs::job_updates::{JobTransition, TransitionError};
use crate::types::params::database::MongoDbParams;
use crate::types::JobStatus;
use crate::utils::metrics::DISPATCHER_METRICS;

/// Concurrent progress writes bump `version` without changing status; a
/// status write that loses only on version is retried this many times.
const MAX_CAS_ATTEMPTS: usize = 5;
const DUPLICATE_KEY_CODE: i32 = 11000;

/// MongoDB job store
pub struct MongoJobRepository {
    database: Database,
}

impl MongoJobRepository {
    pub async fn new(params: &MongoDbParams) -> Result<Self, DatabaseError> {
        let client = Client::with_uri_str(&params.connection_uri).await?;
        let database = client.database(&params.database_name);
        let repository = Self { database };
        repository.ensure_indexes().await?;
        Ok(repository)
    }

    fn jobs(&self) -> Collection<JobItem> {
        self.database.collection(JOBS_COLLECTION)
    }

    async fn ensure_indexes(&self) -> Result<(), DatabaseError> {
        let unique_id = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        let by_status = IndexModel::builder().keys(doc! { "status": 1, "updated_at": -1 }).build();
        self.jobs().create_indexes([unique_id, by_status], None).await?;
        Ok(())
    }

    async fn find_jobs(&self, filter: Document, sort: Document, limit: Option<i64>) -> Result<Vec<JobItem>, DatabaseError> {
        let options = FindOptions::builder().sort(sort).limit(limit).build();
        let cursor = self.jobs().find(filter, options).await?;
        Ok(cursor.try_collect().await?)
    }

    fn record_duration(operation: &'static str, start: Instant) {
        let attributes = [KeyValue::new("db_operation_name", operation)];
        DISPATCHER_METRICS.db_calls_response_time.record(start.elapsed().as_secs_f64(), &attributes);
    }
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY_CODE
    )
}

fn status_bson(status: JobStatus) -> Result<Bson, DatabaseError> {
    Ok(bson::to_bson(&status)?)
}

fn statuses_where(predicate: impl Fn(&JobStatus) -> bool) -> Result<Vec<Bson>, DatabaseError> {
    JobStatus::iter().filter(|status| predicate(status)).map(status_bson).collect()
}

#[async_trait]
impl JobRepository for MongoJobRepository {
    async fn create_job(&self, job: JobItem) -> Result<JobItem, DatabaseError> {
        let start = Instant::now();
        match self.jobs().insert_one(&job, None).await {
            Ok(_) => {
                debug!(job_id = %job.id, "Job created in MongoDB successfully");
                Self::record_duration("create_job", start);
                Ok(job)
            }
            Err(e) if is_duplicate_key(&e) => {
                Err(DatabaseError::ItemAlreadyExists(format!("Job already exists with id {}", job.id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_job_by_id(&self, id: Uuid) -> Result<Option<JobItem>, DatabaseError> {
        let start = Instant::now();
        let job = self.jobs().find_one(doc! { "id": id }, None).await?;
        Self::record_duration("get_job_by_id", start);
        Ok(job)
    }

    async fn compare_and_swap_status(
        &self,
        id: Uuid,
        expected: JobStatus,
        transition: JobTransition,
    ) -> Result<JobItem, DatabaseError> {
        let start = Instant::now();
        let options = FindOneAndReplaceOptions::builder().upsert(false).return_document(ReturnDocument::After).build();

        for _ in 0..MAX_CAS_ATTEMPTS {
            let current = self.get_job_by_id(id).await?.ok_or(DatabaseError::JobNotFound(id))?;
            let next = next_state(&current, expected, &transition, Utc::now())?;

            let filter = doc! {
                "id": id,
                "status": status_bson(expected)?,
                "version": current.version,
            };
            if let Some(updated) = self.jobs().find_one_and_replace(filter, &next, options.clone()).await? {
                debug!(job_id = %id, from = %expected, to = %updated.status, "Job status swapped");
                Self::record_duration("compare_and_swap_status", start);
                return Ok(updated);
            }
            // Lost the race. The next read tells whether the status moved or only the version.
        }

        warn!(job_id = %id, "Gave up on status update after repeated version conflicts");
        Err(DatabaseError::UpdateFailed(format!(
            "Job {id} kept changing while moving it out of {expected}, gave up after {MAX_CAS_ATTEMPTS} attempts"
        )))
    }

    async fn update_progress(
        &self,
        id: Uuid,
        percentage: f64,
        message: Option<String>,
    ) -> Result<JobItem, DatabaseError> {
        let start = Instant::now();
        let filter = doc! { "id": id, "status": status_bson(JobStatus::Processing)? };
        let update = doc! {
            "$set": {
                "progress_percentage": percentage.clamp(0.0, 100.0),
                "progress_message": message.map(Bson::String).unwrap_or(Bson::Null),
                "updated_at": bson::DateTime::from_chrono(Utc::now()),
            },
            "$inc": { "version": 1_i64 },
        };
        let options = FindOneAndUpdateOptions::builder().upsert(false).return_document(ReturnDocument::After).build();

        match self.jobs().find_one_and_update(filter, update, options).await? {
            Some(job) => {
                Self::record_duration("update_progress", start);
                Ok(job)
            }
            None => match self.get_job_by_id(id).await? {
                Some(job) => Err(TransitionError::NotProcessing(job.status).into()),
                None => Err(DatabaseError::JobNotFound(id)),
            },
        }
    }

    async fn get_active_jobs(&self, limit: Option<i64>) -> Result<Vec<JobItem>, DatabaseError> {
        let start = Instant::now();
        let filter = doc! { "status": { "$in": statuses_where(JobStatus::is_active)? } };
        let jobs = self.find_jobs(filter, doc! { "created_at": -1 }, limit).await?;
        Self::record_duration("get_active_jobs", start);
        Ok(jobs)
    }

    async fn get_recent_terminal_jobs(
        &self,
        since: DateTime<Utc>,
        limit: Option<i64>,
    ) -> Result<Vec<JobItem>, DatabaseError> {
        let start = Instant::now();
        let filter = doc! {
            "status": { "$in": statuses_where(JobStatus::is_terminal)? },
            "updated_at": { "$gte": bson::DateTime::from_chrono(since) },
        };
        let jobs = self.find_jobs(filter, doc! { "updated_at": -1 }, limit).await?;
        Self::record_duration("get_recent_terminal_jobs", start);
        Ok(jobs)
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        self.database.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }
}
