pub mod broker;
pub mod compute;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::types::jobs::job_item::JobItem;
use crate::types::jobs::job_updates::JobTransition;
use crate::types::{JobStatus, JobType};

pub use broker::InMemoryBroker;
pub use compute::{Gate, ScriptedEngine};

pub fn spot_payload() -> serde_json::Value {
    json!({"boards": ["AhKd2c", "7s7d2h"], "players": 2})
}

/// A job walked forward to `status` through real transitions.
pub fn build_job_item(job_type: JobType, status: JobStatus, created_at: DateTime<Utc>) -> JobItem {
    let mut job = JobItem::create(job_type, spot_payload(), created_at);
    let path = match status {
        JobStatus::Queued => vec![],
        JobStatus::Processing => vec![JobTransition::StartProcessing],
        JobStatus::Cancelled => vec![JobTransition::Cancel],
        JobStatus::Completed => vec![JobTransition::StartProcessing, JobTransition::complete(json!({"equity": 0.5}))],
        JobStatus::Failed => vec![JobTransition::StartProcessing, JobTransition::fail("engine error")],
    };
    for transition in &path {
        job.apply(transition, created_at).expect("valid transition");
    }
    job
}
