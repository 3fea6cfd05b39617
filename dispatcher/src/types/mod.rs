pub mod jobs;
pub mod params;
pub mod queue;

pub use dispatcher_job_client::types::{JobFamily, JobStatus, JobType};
