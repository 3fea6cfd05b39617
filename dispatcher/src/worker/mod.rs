pub mod controller;
pub mod job_worker;
pub mod service;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::core::config::Config;
use crate::DispatcherResult;
pub use controller::WorkerController;
pub use job_worker::{JobWorker, MessageOutcome};
pub use service::JobService;

/// Starts the worker pool in the background and returns its controller.
///
/// Workers stop when `shutdown_token` is cancelled or the controller is shut down.
pub async fn initialize_worker(
    config: Arc<Config>,
    shutdown_token: CancellationToken,
) -> DispatcherResult<WorkerController> {
    info!("Initializing workers");

    let mut controller = WorkerController::new(config, shutdown_token);
    controller.start().await?;

    info!(workers = controller.workers().len(), "Workers initialized and started successfully");
    Ok(controller)
}
