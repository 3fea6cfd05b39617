use chrono::{DateTime, Utc};
use dispatcher_job_client::types::{JobSummary, JobWithResult};
use mongodb::bson::serde_helpers::{chrono_datetime_as_bson_datetime, uuid_1_as_binary};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::jobs::job_updates::{JobTransition, TransitionError};
use crate::types::{JobStatus, JobType};

/// Durable record of one submitted job.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JobItem {
    /// an uuid to identify a job
    #[serde(with = "uuid_1_as_binary")]
    pub id: Uuid,
    pub job_type: JobType,
    pub status: JobStatus,
    /// opaque payload handed to the compute engine
    pub input_data: Value,
    #[serde(default)]
    pub result_data: Option<Value>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub progress_percentage: Option<f64>,
    #[serde(default)]
    pub progress_message: Option<String>,
    /// number of times a worker moved the job into `processing`
    pub attempts: u32,
    /// bumped on every write, used for optimistic locking
    pub version: i64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub estimated_duration_secs: i64,
    #[serde(default)]
    pub actual_duration_secs: Option<i64>,
}

impl JobItem {
    /// A fresh `queued` job with a new identity.
    pub fn create(job_type: JobType, input_data: Value, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_type,
            status: JobStatus::Queued,
            input_data,
            result_data: None,
            error_message: None,
            progress_percentage: None,
            progress_message: None,
            attempts: 0,
            version: 0,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            estimated_duration_secs: job_type.default_estimated_duration().as_secs() as i64,
            actual_duration_secs: None,
        }
    }

    /// Applies `transition` in place. On error the record is left untouched.
    ///
    /// Both job stores route every status write through here so they enforce
    /// the same lifecycle rules.
    pub fn apply(&mut self, transition: &JobTransition, now: DateTime<Utc>) -> Result<(), TransitionError> {
        let next = transition.target_status();
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::InvalidTransition { from: self.status, to: next });
        }

        match transition {
            JobTransition::StartProcessing => {
                self.attempts += 1;
                self.started_at.get_or_insert(now);
                self.progress_percentage = Some(0.0);
                self.progress_message = None;
            }
            JobTransition::Complete { result_data } => {
                self.result_data = Some(result_data.clone());
                self.progress_percentage = Some(100.0);
            }
            JobTransition::Fail { error_message } => {
                if error_message.trim().is_empty() {
                    return Err(TransitionError::EmptyErrorMessage);
                }
                self.error_message = Some(error_message.clone());
            }
            JobTransition::Cancel => {}
        }

        if next.is_terminal() {
            let started = self.started_at.unwrap_or(self.created_at);
            self.completed_at = Some(now);
            self.actual_duration_secs = Some((now - started).num_seconds().max(0));
            self.progress_message = None;
        }

        self.status = next;
        self.updated_at = now;
        self.version += 1;
        Ok(())
    }

    pub fn set_progress(
        &mut self,
        percentage: f64,
        message: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.status != JobStatus::Processing {
            return Err(TransitionError::NotProcessing(self.status));
        }
        self.progress_percentage = Some(percentage.clamp(0.0, 100.0));
        self.progress_message = message;
        self.updated_at = now;
        self.version += 1;
        Ok(())
    }

    pub fn to_summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            job_type: self.job_type,
            status: self.status,
            progress_percentage: self.progress_percentage,
            progress_message: self.progress_message.clone(),
            error_message: self.error_message.clone(),
            created_at: self.created_at,
            completed_at: self.completed_at,
            estimated_duration: u64::try_from(self.estimated_duration_secs).ok(),
            actual_duration: self.actual_duration_secs.and_then(|s| u64::try_from(s).ok()),
        }
    }

    pub fn to_detail(&self) -> JobWithResult {
        JobWithResult {
            summary: self.to_summary(),
            input_data: self.input_data.clone(),
            result_data: self.result_data.clone(),
        }
    }
}
