use once_cell::sync::Lazy;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Dispatcher instruments on the global meter. They record nothing until the
/// embedding process installs a meter provider.
pub static DISPATCHER_METRICS: Lazy<DispatcherMetrics> = Lazy::new(DispatcherMetrics::register);

pub struct DispatcherMetrics {
    pub jobs_submitted: Counter<u64>,
    pub jobs_completed: Counter<u64>,
    pub jobs_failed: Counter<u64>,
    pub jobs_cancelled: Counter<u64>,
    pub deliveries_retried: Counter<u64>,
    pub deliveries_dead_lettered: Counter<u64>,
    pub compute_duration: Histogram<f64>,
    pub db_calls_response_time: Histogram<f64>,
}

impl DispatcherMetrics {
    pub fn register() -> Self {
        let meter: Meter = global::meter("crates.dispatcher.opentelemetry");

        let jobs_submitted = meter
            .u64_counter("jobs_submitted")
            .with_description("Jobs accepted and queued")
            .with_unit("jobs")
            .build();

        let jobs_completed = meter
            .u64_counter("jobs_completed")
            .with_description("Jobs that finished with a result")
            .with_unit("jobs")
            .build();

        let jobs_failed = meter
            .u64_counter("jobs_failed")
            .with_description("Jobs that ended failed, after retries or at submission")
            .with_unit("jobs")
            .build();

        let jobs_cancelled = meter
            .u64_counter("jobs_cancelled")
            .with_description("Jobs cancelled by a client")
            .with_unit("jobs")
            .build();

        let deliveries_retried = meter
            .u64_counter("deliveries_retried")
            .with_description("Failed attempts republished for another try")
            .with_unit("messages")
            .build();

        let deliveries_dead_lettered = meter
            .u64_counter("deliveries_dead_lettered")
            .with_description("Messages rejected into a dead-letter queue")
            .with_unit("messages")
            .build();

        let compute_duration = meter
            .f64_histogram("compute_duration")
            .with_description("Time spent in the compute engine per attempt")
            .with_unit("s")
            .build();

        let db_calls_response_time = meter
            .f64_histogram("db_calls_response_time")
            .with_description("Response time of DB calls over time")
            .with_unit("s")
            .build();

        Self {
            jobs_submitted,
            jobs_completed,
            jobs_failed,
            jobs_cancelled,
            deliveries_retried,
            deliveries_dead_lettered,
            compute_duration,
            db_calls_response_time,
        }
    }
}
