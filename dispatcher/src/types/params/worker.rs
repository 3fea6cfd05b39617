use std::time::Duration;

use crate::cli::RunCmd;

#[derive(Debug, Clone)]
pub struct WorkerParams {
    pub enabled: bool,
    /// Consumers per family queue
    pub concurrency: usize,
    pub compute_timeout: Duration,
    pub receive_wait: Duration,
}

impl From<&RunCmd> for WorkerParams {
    fn from(run_cmd: &RunCmd) -> Self {
        Self {
            enabled: !run_cmd.worker_args.no_workers,
            concurrency: run_cmd.worker_args.worker_concurrency,
            compute_timeout: Duration::from_secs(run_cmd.compute_args.compute_timeout_seconds),
            receive_wait: Duration::from_millis(run_cmd.worker_args.receive_wait_ms.max(1)),
        }
    }
}
