use std::time::Duration;

use crate::cli::server::ServerCliArgs;

#[derive(Debug, Clone)]
pub struct ServerParams {
    pub host: String,
    pub port: u16,
    pub enabled: bool,
    /// Finished jobs younger than this are listed as recent
    pub recent_window: Duration,
    pub recent_limit: i64,
    pub active_limit: i64,
}

impl From<ServerCliArgs> for ServerParams {
    fn from(args: ServerCliArgs) -> Self {
        Self {
            host: args.host,
            port: args.port,
            enabled: !args.no_server,
            recent_window: Duration::from_secs(args.recent_window_seconds),
            recent_limit: i64::from(args.recent_limit),
            active_limit: i64::from(args.active_limit),
        }
    }
}
