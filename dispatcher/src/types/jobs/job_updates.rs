use serde_json::Value;

use crate::types::JobStatus;

/// A single status change applied to a job record.
///
/// Payloads travel with the transition that needs them, so a `completed` job
/// always carries a result and a `failed` job always carries an error.
#[derive(Debug, Clone, PartialEq)]
pub enum JobTransition {
    StartProcessing,
    Complete { result_data: Value },
    Fail { error_message: String },
    Cancel,
}

impl JobTransition {
    pub fn complete(result_data: Value) -> Self {
        JobTransition::Complete { result_data }
    }

    pub fn fail(error_message: impl Into<String>) -> Self {
        JobTransition::Fail { error_message: error_message.into() }
    }

    pub fn target_status(&self) -> JobStatus {
        match self {
            JobTransition::StartProcessing => JobStatus::Processing,
            JobTransition::Complete { .. } => JobStatus::Completed,
            JobTransition::Fail { .. } => JobStatus::Failed,
            JobTransition::Cancel => JobStatus::Cancelled,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TransitionError {
    #[error("Transition from {from} to {to} is not allowed")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("A failed job needs a non-empty error message")]
    EmptyErrorMessage,

    #[error("Progress can only be reported while processing, job is {0}")]
    NotProcessing(JobStatus),
}
