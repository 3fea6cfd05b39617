//! Client side of the solver job dispatcher.
//!
//! Holds the wire types shared with the dispatcher service, an HTTP client for
//! its REST surface, and [`StatusPoller`], which turns repeated snapshots of the
//! job list into exactly-once "job reached a terminal state" notifications.

pub mod api;
pub mod error;
pub mod poller;
pub mod types;
pub mod view;

pub use api::{HttpJobsApi, JobsApi};
pub use error::ApiError;
pub use poller::{PollOutcome, StatusPoller};
pub use types::{JobFamily, JobStatus, JobSummary, JobType, JobWithResult};
pub use view::Page;
