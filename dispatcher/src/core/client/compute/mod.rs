pub mod error;
pub mod http;

use async_trait::async_trait;
pub use error::ComputeError;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::types::JobType;

/// What a worker hands to the compute engine for one attempt.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ComputeRequest {
    pub job_id: Uuid,
    pub job_type: JobType,
    pub input_data: Value,
}

/// The equity / solver engine. Results are opaque to the dispatcher.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ComputeEngine: Send + Sync {
    async fn execute(&self, request: &ComputeRequest) -> Result<Value, ComputeError>;
    async fn health_check(&self) -> Result<(), ComputeError>;
}
