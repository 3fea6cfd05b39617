use clap::Args;
use url::Url;

#[derive(Debug, Clone, Args)]
pub struct WatchCmd {
    /// Base URL of a running dispatcher.
    #[arg(env = "DISPATCHER_API_URL", long, default_value = "http://127.0.0.1:3000/")]
    pub api_url: Url,

    /// Seconds between polls.
    #[arg(env = "DISPATCHER_WATCH_INTERVAL_SECONDS", long, default_value = "5")]
    pub poll_interval_seconds: u64,

    /// Per-request timeout in seconds.
    #[arg(env = "DISPATCHER_WATCH_REQUEST_TIMEOUT_SECONDS", long, default_value = "10")]
    pub request_timeout_seconds: u64,
}
