use std::time::Duration;

use url::Url;

use crate::cli::WatchCmd;
use crate::DispatcherError;

#[derive(Debug, Clone)]
pub struct WatchParams {
    pub api_url: Url,
    pub interval: Duration,
    pub request_timeout: Duration,
}

impl TryFrom<WatchCmd> for WatchParams {
    type Error = DispatcherError;

    fn try_from(cmd: WatchCmd) -> Result<Self, Self::Error> {
        if cmd.poll_interval_seconds == 0 {
            return Err(DispatcherError::ConfigError("poll interval must be positive".to_string()));
        }
        Ok(Self {
            api_url: cmd.api_url,
            interval: Duration::from_secs(cmd.poll_interval_seconds),
            request_timeout: Duration::from_secs(cmd.request_timeout_seconds.max(1)),
        })
    }
}
