use clap::Args;

/// Parameters used to config the server.
#[derive(Debug, Clone, Args)]
pub struct ServerCliArgs {
    /// The host to listen on.
    #[arg(env = "DISPATCHER_HOST", long, default_value = "127.0.0.1")]
    pub host: String,

    /// The port to listen on.
    #[arg(env = "DISPATCHER_PORT", long, default_value = "3000")]
    pub port: u16,

    /// Do not serve the REST API, only run workers.
    #[arg(env = "DISPATCHER_NO_SERVER", long, default_value_t = false)]
    pub no_server: bool,

    /// How far back `/jobs/recent` looks for finished jobs, in seconds.
    #[arg(env = "DISPATCHER_RECENT_WINDOW_SECONDS", long, default_value = "86400")]
    pub recent_window_seconds: u64,

    /// Maximum number of finished jobs returned by `/jobs/recent`.
    #[arg(env = "DISPATCHER_RECENT_LIMIT", long, default_value = "50")]
    pub recent_limit: u32,

    /// Maximum number of active jobs returned by `/jobs/recent`.
    #[arg(env = "DISPATCHER_ACTIVE_LIMIT", long, default_value = "100")]
    pub active_limit: u32,
}
