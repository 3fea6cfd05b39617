use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Lifecycle status of a job.
///
/// Statuses arrive with inconsistent casing (`"completed"`, `"COMPLETED"`), so
/// deserialization is case-insensitive and everything past the wire boundary
/// compares enum values only. Serialization always emits lowercase.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobStatus {
    /// Persisted and published, waiting for a worker
    Queued,
    /// A worker has picked the job up
    Processing,
    /// The compute engine returned a result
    Completed,
    /// The job exhausted its retries or could not be enqueued
    Failed,
    /// An external actor cancelled the job
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether `next` may follow `self` in a job's recorded status history.
    ///
    /// Transitions only move forward along `queued -> processing -> terminal`.
    /// A queued job may fail or be cancelled directly, but only a worker
    /// completes it, so `queued -> completed` is refused.
    /// `processing -> processing` is accepted because a redelivered message
    /// resumes a job that is already being processed.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match self {
            JobStatus::Queued => {
                matches!(next, JobStatus::Processing | JobStatus::Failed | JobStatus::Cancelled)
            }
            JobStatus::Processing => next == JobStatus::Processing || next.is_terminal(),
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown job status '{0}'")]
pub struct UnknownJobStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownJobStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" | "canceled" => Ok(JobStatus::Cancelled),
            _ => Err(UnknownJobStatus(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        JobStatus::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

/// Kind of compute work a job carries. Determines routing and result schema.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum JobType {
    SpotSimulation,
    SolverSimulation,
    SolverAnalysis,
}

impl JobType {
    pub fn family(&self) -> JobFamily {
        match self {
            JobType::SpotSimulation => JobFamily::Spot,
            JobType::SolverSimulation | JobType::SolverAnalysis => JobFamily::Solver,
        }
    }

    /// Path segment under which the compute engine exposes this job type.
    pub fn engine_path(&self) -> &'static str {
        match self {
            JobType::SpotSimulation => "spot/simulate",
            JobType::SolverSimulation => "solver/simulate",
            JobType::SolverAnalysis => "solver/analyze",
        }
    }

    /// Rough run time used for ETA display until the job actually finishes.
    pub fn default_estimated_duration(&self) -> Duration {
        match self {
            JobType::SpotSimulation => Duration::from_secs(30),
            JobType::SolverSimulation => Duration::from_secs(300),
            JobType::SolverAnalysis => Duration::from_secs(120),
        }
    }
}

/// Group of job types sharing one main queue and one dead-letter queue.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum JobFamily {
    Spot,
    Solver,
}

impl JobFamily {
    /// Name of the family's main queue, e.g. `spot-processing`.
    pub fn queue_name(&self) -> String {
        format!("{}-processing", self)
    }

    /// Name of the family's dead-letter queue, e.g. `spot-processing-dlq`.
    pub fn dlq_name(&self) -> String {
        format!("{}-processing-dlq", self)
    }

    /// Binding key of the main queue on the main exchange, e.g. `spot.*`.
    pub fn routing_key(&self) -> String {
        format!("{}.*", self)
    }

    pub fn default_job_type(&self) -> JobType {
        match self {
            JobFamily::Spot => JobType::SpotSimulation,
            JobFamily::Solver => JobType::SolverSimulation,
        }
    }

    pub fn job_types(&self) -> &'static [JobType] {
        match self {
            JobFamily::Spot => &[JobType::SpotSimulation],
            JobFamily::Solver => &[JobType::SolverSimulation, JobType::SolverAnalysis],
        }
    }
}

/// List view of a job as returned by `GET /jobs/recent`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JobSummary {
    pub id: Uuid,
    #[serde(rename = "type", alias = "job_type")]
    pub job_type: JobType,
    pub status: JobStatus,
    #[serde(default)]
    pub progress_percentage: Option<f64>,
    #[serde(default)]
    pub progress_message: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Seconds
    #[serde(default)]
    pub estimated_duration: Option<u64>,
    /// Seconds
    #[serde(default)]
    pub actual_duration: Option<u64>,
}

/// Detail view of a job including its payloads, from `GET /jobs/{id}/details`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JobWithResult {
    #[serde(flatten)]
    pub summary: JobSummary,
    #[serde(default)]
    pub input_data: Value,
    #[serde(default)]
    pub result_data: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct RecentJobsResponse {
    #[serde(default)]
    pub active_jobs: Vec<JobSummary>,
    #[serde(default)]
    pub recent_jobs: Vec<JobSummary>,
    /// Opaque account information passed through to the caller.
    #[serde(default)]
    pub credits_info: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JobDetailsResponse {
    pub job: JobWithResult,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SimulateRequest {
    /// Defaults to the family's primary job type when absent.
    #[serde(default)]
    pub job_type: Option<JobType>,
    pub input_data: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SubmittedJob {
    pub id: Uuid,
    pub status: JobStatus,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SubmitJobResponse {
    pub job: SubmittedJob,
    #[serde(default)]
    pub credits_info: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    #[rstest]
    #[case("completed", JobStatus::Completed)]
    #[case("COMPLETED", JobStatus::Completed)]
    #[case("Processing", JobStatus::Processing)]
    #[case(" queued ", JobStatus::Queued)]
    #[case("CANCELED", JobStatus::Cancelled)]
    fn status_deserialization_ignores_case(#[case] raw: &str, #[case] expected: JobStatus) {
        let parsed: JobStatus = serde_json::from_value(Value::String(raw.to_string())).unwrap();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&JobStatus::Cancelled).unwrap(), "\"cancelled\"");
        assert_eq!(JobStatus::Processing.to_string(), "processing");
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(serde_json::from_str::<JobStatus>("\"paused\"").is_err());
    }

    #[test]
    fn terminal_statuses_never_transition() {
        for from in JobStatus::iter().filter(JobStatus::is_terminal) {
            for to in JobStatus::iter() {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
            }
        }
    }

    #[rstest]
    #[case(JobStatus::Queued, JobStatus::Processing, true)]
    #[case(JobStatus::Queued, JobStatus::Cancelled, true)]
    #[case(JobStatus::Queued, JobStatus::Failed, true)]
    #[case(JobStatus::Queued, JobStatus::Queued, false)]
    #[case(JobStatus::Queued, JobStatus::Completed, false)]
    #[case(JobStatus::Processing, JobStatus::Processing, true)]
    #[case(JobStatus::Processing, JobStatus::Completed, true)]
    #[case(JobStatus::Processing, JobStatus::Queued, false)]
    fn transitions_follow_lifecycle(#[case] from: JobStatus, #[case] to: JobStatus, #[case] allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn family_names_match_broker_contract() {
        assert_eq!(JobFamily::Spot.queue_name(), "spot-processing");
        assert_eq!(JobFamily::Spot.dlq_name(), "spot-processing-dlq");
        assert_eq!(JobFamily::Solver.routing_key(), "solver.*");
        assert_eq!(JobType::SolverAnalysis.family(), JobFamily::Solver);
        assert_eq!("SOLVER".parse::<JobFamily>().unwrap(), JobFamily::Solver);
    }

    #[test]
    fn job_type_uses_screaming_snake_case() {
        assert_eq!(serde_json::to_string(&JobType::SpotSimulation).unwrap(), "\"SPOT_SIMULATION\"");
        assert_eq!("solver_analysis".parse::<JobType>().unwrap(), JobType::SolverAnalysis);
    }

    #[test]
    fn summary_accepts_type_field_and_mixed_case_status() {
        let raw = serde_json::json!({
            "id": "7f7c1c8e-8f38-4a34-9a8e-2c1f9f1b2a11",
            "type": "SPOT_SIMULATION",
            "status": "COMPLETED",
            "created_at": "2024-05-01T10:00:00Z"
        });
        let summary: JobSummary = serde_json::from_value(raw).unwrap();
        assert_eq!(summary.status, JobStatus::Completed);
        assert_eq!(summary.job_type, JobType::SpotSimulation);
        assert!(summary.completed_at.is_none());
    }
}
