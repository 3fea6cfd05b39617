use clap::Args;

fn parse_positive_usize(s: &str) -> Result<usize, String> {
    let value: usize = s.parse().map_err(|_| format!("'{}' is not a valid number", s))?;
    if value == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(value)
}

#[derive(Debug, Clone, Args)]
pub struct WorkerCliArgs {
    /// Do not consume from queues, only serve the REST API.
    #[arg(env = "DISPATCHER_NO_WORKERS", long, default_value_t = false)]
    pub no_workers: bool,

    /// Consumers started per job family queue.
    #[arg(env = "DISPATCHER_WORKER_CONCURRENCY", long, default_value = "1", value_parser = parse_positive_usize)]
    pub worker_concurrency: usize,

    /// How long a worker waits for a delivery before checking for shutdown, in milliseconds.
    #[arg(env = "DISPATCHER_WORKER_RECEIVE_WAIT_MS", long, default_value = "1000")]
    pub receive_wait_ms: u64,
}
