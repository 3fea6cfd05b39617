use std::time::Duration;

use url::Url;

use crate::cli::compute::ComputeCliArgs;
use crate::DispatcherError;

#[derive(Debug, Clone)]
pub struct ComputeParams {
    pub engine_url: Url,
    pub request_timeout: Duration,
}

impl TryFrom<ComputeCliArgs> for ComputeParams {
    type Error = DispatcherError;

    fn try_from(args: ComputeCliArgs) -> Result<Self, Self::Error> {
        if args.compute_timeout_seconds == 0 {
            return Err(DispatcherError::ConfigError("compute timeout must be positive".to_string()));
        }
        if args.compute_engine_url.cannot_be_a_base() {
            return Err(DispatcherError::ConfigError(format!(
                "compute engine URL {} cannot be used as a base",
                args.compute_engine_url
            )));
        }
        Ok(Self { engine_url: args.compute_engine_url, request_timeout: Duration::from_secs(args.compute_timeout_seconds) })
    }
}
