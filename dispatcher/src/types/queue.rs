use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::JobType;

/// Header carrying how many times a delivery has already been retried.
pub const RETRY_COUNT_HEADER: &str = "x-retry-count";

/// Body of every message published to a family's main queue.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JobQueueMessage {
    pub job_id: Uuid,
    pub job_type: JobType,
    pub payload: Value,
}

impl JobQueueMessage {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}
