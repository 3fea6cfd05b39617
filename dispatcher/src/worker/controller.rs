use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument};

use crate::core::config::Config;
use crate::worker::job_worker::JobWorker;
use crate::DispatcherResult;

/// Owns the worker tasks of one dispatcher process.
pub struct WorkerController {
    config: Arc<Config>,
    workers: Vec<Arc<JobWorker>>,
    tasks: JoinSet<()>,
    cancellation_token: CancellationToken,
}

impl WorkerController {
    pub fn new(config: Arc<Config>, cancellation_token: CancellationToken) -> Self {
        Self { config, workers: Vec::new(), tasks: JoinSet::new(), cancellation_token }
    }

    pub fn workers(&self) -> &[Arc<JobWorker>] {
        &self.workers
    }

    /// Spawns `concurrency` competing consumers for every served family.
    pub async fn start(&mut self) -> DispatcherResult<()> {
        let concurrency = self.config.worker_config().concurrency.max(1);

        for family in self.config.topology().families.iter().map(|f| f.family) {
            for index in 0..concurrency {
                let worker =
                    Arc::new(JobWorker::new(family, self.config.clone(), self.cancellation_token.child_token())?);
                let span = info_span!("worker", queue = %worker.queue(), index);

                let task_worker = worker.clone();
                self.tasks.spawn(async move { task_worker.run().await }.instrument(span));
                self.workers.push(worker);
            }
            info!(%family, concurrency, "Workers started");
        }
        Ok(())
    }

    /// Signals every worker and waits until each has finished its current delivery.
    pub async fn shutdown(&mut self) -> DispatcherResult<()> {
        info!("Signaling {} workers to shutdown gracefully", self.workers.len());
        for worker in &self.workers {
            worker.shutdown();
        }
        self.wait_for_completion().await;
        info!("All workers stopped");
        Ok(())
    }

    pub async fn wait_for_completion(&mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Worker task panicked");
            }
        }
    }
}
