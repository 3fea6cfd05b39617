use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument, Span};
use uuid::Uuid;

use crate::core::client::compute::{ComputeError, ComputeRequest};
use crate::core::client::database::DatabaseError;
use crate::core::client::queue::{InboundMessage, OutboundMessage, Subscription};
use crate::core::config::Config;
use crate::error::ConsumptionError;
use crate::setup::topology::FamilyTopology;
use crate::types::jobs::job_item::JobItem;
use crate::types::jobs::job_updates::JobTransition;
use crate::types::queue::JobQueueMessage;
use crate::types::{JobFamily, JobStatus};
use crate::utils::metrics::DISPATCHER_METRICS;
use crate::{DispatcherError, DispatcherResult};

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// What a worker did with one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Result recorded, message acked
    Completed,
    /// Attempt failed below the ceiling; a copy with the next retry count was published
    Retried { attempt: u32 },
    /// Handed back to the broker untouched, e.g. the job store was unreachable
    Requeued,
    /// Ceiling reached; job recorded `failed` and the message rejected into the DLQ
    DeadLettered,
    /// The job was already terminal when the message arrived
    Skipped,
    /// The job turned terminal while this attempt ran, so its outcome was dropped
    Superseded,
    /// Undecodable, unknown or misrouted message, rejected into the DLQ
    Rejected,
}

/// Competing consumer on one family's main queue.
pub struct JobWorker {
    config: Arc<Config>,
    family: JobFamily,
    queue: String,
    main_exchange: String,
    routing_key: String,
    max_retries: u32,
    cancellation_token: CancellationToken,
}

impl JobWorker {
    pub fn new(family: JobFamily, config: Arc<Config>, cancellation_token: CancellationToken) -> DispatcherResult<Self> {
        let topology: &FamilyTopology = config
            .family(family)
            .ok_or_else(|| DispatcherError::WorkerError(format!("no queues declared for the {family} family")))?;
        let max_retries = topology
            .max_retries()
            .filter(|n| *n > 0)
            .ok_or_else(|| DispatcherError::WorkerError(format!("queue {} has no retry ceiling", topology.queue.name)))?;

        Ok(Self {
            family,
            queue: topology.queue.name.clone(),
            main_exchange: topology.binding.exchange.clone(),
            routing_key: topology.binding.routing_key.clone(),
            max_retries,
            config,
            cancellation_token,
        })
    }

    pub fn family(&self) -> JobFamily {
        self.family
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn shutdown(&self) {
        info!(queue = %self.queue, "Triggering shutdown for worker");
        self.cancellation_token.cancel();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Consumes until shutdown. Broker errors drop the subscription and
    /// resubscribe with exponential backoff; a delivery that has been taken is
    /// always finished before the worker stops.
    pub async fn run(&self) {
        let mut backoff = INITIAL_BACKOFF;
        info!(queue = %self.queue, max_retries = self.max_retries, "Starting worker");

        'subscribe: while !self.is_shutdown_requested() {
            let mut subscription = match self.config.broker().subscribe(&self.queue).await {
                Ok(subscription) => subscription,
                Err(e) => {
                    error!(error = %e, backoff_ms = backoff.as_millis() as u64, "Failed to subscribe, retrying");
                    if !self.sleep_or_shutdown(backoff).await {
                        break;
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
            };
            backoff = INITIAL_BACKOFF;

            loop {
                let received = tokio::select! {
                    biased;
                    _ = self.cancellation_token.cancelled() => break 'subscribe,
                    received = self.next_message(subscription.as_mut()) => received,
                };

                let delivery = match received {
                    Ok(Some(delivery)) => delivery,
                    Ok(None) => continue,
                    Err(e) => {
                        error!(error = %e, "Consumer failed, resubscribing");
                        break;
                    }
                };

                match self.process_delivery(delivery).await {
                    Ok(outcome) => debug!(?outcome, "Delivery handled"),
                    Err(e) => {
                        error!(error = %e, "Could not settle delivery, resubscribing");
                        break;
                    }
                }
            }

            if !self.sleep_or_shutdown(backoff).await {
                break;
            }
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }

        info!(queue = %self.queue, "Worker stopped");
    }

    async fn next_message(
        &self,
        subscription: &mut dyn Subscription,
    ) -> Result<Option<InboundMessage>, ConsumptionError> {
        subscription.next_message(self.config.worker_config().receive_wait).await.map_err(|e| {
            ConsumptionError::FailedToConsumeFromQueue { queue: self.queue.clone(), error_msg: e.to_string() }
        })
    }

    /// Returns false if shutdown was requested while sleeping.
    async fn sleep_or_shutdown(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancellation_token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    fn create_job_span(&self, job_id: Option<Uuid>, attempt: u32) -> Span {
        let correlation_id = Uuid::new_v4();
        let job_id = job_id.map(|id| id.to_string()).unwrap_or_default();
        tracing::info_span!(
            "job_processing",
            job_id = %job_id,
            queue = %self.queue,
            job_type = tracing::field::Empty,
            attempt,
            correlation_id = %correlation_id,
        )
    }

    /// Runs one delivery through the job state machine and settles it with the broker.
    ///
    /// The message is only acked or rejected after the attempt's outcome is in
    /// the job store. An error means the delivery could not be settled.
    pub async fn process_delivery(&self, delivery: InboundMessage) -> Result<MessageOutcome, ConsumptionError> {
        let retry_count = delivery.retry_count();
        let attempt = retry_count.saturating_add(1);

        let message = match JobQueueMessage::parse(&delivery.body) {
            Ok(message) => message,
            Err(e) => {
                let span = self.create_job_span(None, attempt);
                return async {
                    warn!(error = %e, "Undecodable message, rejecting into the DLQ");
                    delivery.reject(false).await?;
                    Ok::<_, ConsumptionError>(MessageOutcome::Rejected)
                }
                .instrument(span)
                .await;
            }
        };

        let span = self.create_job_span(Some(message.job_id), attempt);
        span.record("job_type", tracing::field::display(message.job_type));
        async move {
            let outcome = self.handle_message(&message, &delivery, retry_count).await?;
            info!(?outcome, "Delivery settled");
            Ok::<_, ConsumptionError>(outcome)
        }
        .instrument(span)
        .await
    }

    async fn handle_message(
        &self,
        message: &JobQueueMessage,
        delivery: &InboundMessage,
        retry_count: u32,
    ) -> Result<MessageOutcome, ConsumptionError> {
        let job = match self.config.database().get_job_by_id(message.job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                warn!("{}, rejecting into the DLQ", ConsumptionError::UnknownJob(message.job_id));
                delivery.reject(false).await?;
                return Ok(MessageOutcome::Rejected);
            }
            Err(e) => return self.requeue(delivery, e.to_string()).await,
        };

        if job.job_type.family() != self.family {
            warn!(job_type = %job.job_type, family = %self.family, "Job does not belong to this queue, rejecting");
            delivery.reject(false).await?;
            return Ok(MessageOutcome::Rejected);
        }

        if job.status.is_terminal() {
            info!(status = %job.status, "Job already finished, dropping message");
            delivery.ack().await?;
            return Ok(MessageOutcome::Skipped);
        }

        let job = match self
            .config
            .database()
            .compare_and_swap_status(job.id, job.status, JobTransition::StartProcessing)
            .await
        {
            Ok(job) => job,
            Err(DatabaseError::StatusMismatch { actual, .. }) if actual.is_terminal() => {
                info!(status = %actual, "Job finished before processing started, dropping message");
                delivery.ack().await?;
                return Ok(MessageOutcome::Skipped);
            }
            Err(e) => return self.requeue(delivery, e.to_string()).await,
        };

        let attempt = retry_count.saturating_add(1);
        let note = format!("Attempt {attempt} of {}", self.max_retries);
        if let Err(e) = self.config.database().update_progress(job.id, 0.0, Some(note)).await {
            debug!(error = %e, "Could not record attempt progress");
        }

        match self.compute(&job).await {
            Ok(result_data) => self.record_success(&job, result_data, delivery).await,
            Err(e) => self.record_failure(&job, &e, delivery, retry_count).await,
        }
    }

    async fn compute(&self, job: &JobItem) -> Result<Value, ComputeError> {
        let request = ComputeRequest { job_id: job.id, job_type: job.job_type, input_data: job.input_data.clone() };
        let timeout = self.config.worker_config().compute_timeout;
        let start = Instant::now();

        let result = match tokio::time::timeout(timeout, self.config.compute().execute(&request)).await {
            Ok(result) => result,
            Err(_) => Err(ComputeError::Timeout(timeout)),
        };

        DISPATCHER_METRICS.compute_duration.record(
            start.elapsed().as_secs_f64(),
            &[KeyValue::new("job_type", job.job_type.to_string()), KeyValue::new("success", result.is_ok())],
        );
        result
    }

    async fn record_success(
        &self,
        job: &JobItem,
        result_data: Value,
        delivery: &InboundMessage,
    ) -> Result<MessageOutcome, ConsumptionError> {
        match self
            .config
            .database()
            .compare_and_swap_status(job.id, JobStatus::Processing, JobTransition::complete(result_data))
            .await
        {
            Ok(_) => {
                DISPATCHER_METRICS.jobs_completed.add(1, &[KeyValue::new("job_type", job.job_type.to_string())]);
                delivery.ack().await?;
                Ok(MessageOutcome::Completed)
            }
            Err(DatabaseError::StatusMismatch { actual, .. }) if actual.is_terminal() => {
                info!(status = %actual, "Job turned terminal during computation, discarding result");
                delivery.ack().await?;
                Ok(MessageOutcome::Superseded)
            }
            Err(e) => self.requeue(delivery, e.to_string()).await,
        }
    }

    async fn record_failure(
        &self,
        job: &JobItem,
        error: &ComputeError,
        delivery: &InboundMessage,
        retry_count: u32,
    ) -> Result<MessageOutcome, ConsumptionError> {
        let attempt = retry_count.saturating_add(1);
        let labels = [KeyValue::new("job_type", job.job_type.to_string())];

        if attempt < self.max_retries {
            warn!(error = %error, attempt, max_retries = self.max_retries, "Attempt failed, retrying");

            match self.config.database().get_job_by_id(job.id).await {
                Ok(Some(current)) if current.status.is_terminal() => {
                    info!(status = %current.status, "Job turned terminal during computation, not retrying");
                    delivery.ack().await?;
                    return Ok(MessageOutcome::Superseded);
                }
                Ok(_) => {}
                Err(e) => return self.requeue(delivery, e.to_string()).await,
            }

            let retry = OutboundMessage::persistent(&self.main_exchange, &self.routing_key, delivery.body.clone())
                .with_retry_count(attempt);
            if let Err(e) = self.config.broker().publish(retry).await {
                return self.requeue(delivery, e.to_string()).await;
            }
            DISPATCHER_METRICS.deliveries_retried.add(1, &labels);
            delivery.ack().await?;
            return Ok(MessageOutcome::Retried { attempt });
        }

        let error_message = format!("Failed after {attempt} attempts: {error}");
        error!(error = %error, attempt, "Retry ceiling reached, failing job");
        match self
            .config
            .database()
            .compare_and_swap_status(job.id, JobStatus::Processing, JobTransition::fail(error_message))
            .await
        {
            Ok(_) => {
                DISPATCHER_METRICS.jobs_failed.add(1, &labels);
                DISPATCHER_METRICS.deliveries_dead_lettered.add(1, &labels);
                delivery.reject(false).await?;
                Ok(MessageOutcome::DeadLettered)
            }
            Err(DatabaseError::StatusMismatch { actual, .. }) if actual.is_terminal() => {
                info!(status = %actual, "Job turned terminal during computation, not failing it");
                delivery.ack().await?;
                Ok(MessageOutcome::Superseded)
            }
            Err(e) => self.requeue(delivery, e.to_string()).await,
        }
    }

    async fn requeue(&self, delivery: &InboundMessage, cause: String) -> Result<MessageOutcome, ConsumptionError> {
        error!(error = %cause, "Could not record attempt, returning message to the queue");
        delivery.reject(true).await?;
        Ok(MessageOutcome::Requeued)
    }
}
