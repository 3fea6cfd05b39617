pub mod job_item;
pub mod job_updates;
