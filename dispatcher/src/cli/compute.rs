use clap::Args;
use url::Url;

/// Parameters used to reach the compute engine.
#[derive(Debug, Clone, Args)]
pub struct ComputeCliArgs {
    /// Base URL of the compute engine. Job types are served under it, e.g. `spot/simulate`.
    #[arg(env = "DISPATCHER_COMPUTE_ENGINE_URL", long, default_value = "http://localhost:8000/")]
    pub compute_engine_url: Url,

    /// Deadline for a single compute call. Exceeding it counts as a failed attempt.
    #[arg(env = "DISPATCHER_COMPUTE_TIMEOUT_SECONDS", long, default_value = "900")]
    pub compute_timeout_seconds: u64,
}
