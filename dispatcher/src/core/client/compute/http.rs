use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use super::{ComputeEngine, ComputeError, ComputeRequest};
use crate::types::params::compute::ComputeParams;

const MAX_ERROR_BODY_LEN: usize = 512;

/// Compute engine reached over HTTP. Each job type has its own endpoint under
/// the engine's base URL, e.g. `<base>/spot/simulate`.
pub struct HttpComputeEngine {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpComputeEngine {
    pub fn new(params: &ComputeParams) -> Result<Self, ComputeError> {
        let client = Client::builder().timeout(params.request_timeout).build()?;
        Ok(Self { client, base_url: params.engine_url.clone(), timeout: params.request_timeout })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ComputeError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ComputeError::Url(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(path.split('/'));
        Ok(url)
    }
}

#[async_trait]
impl ComputeEngine for HttpComputeEngine {
    async fn execute(&self, request: &ComputeRequest) -> Result<Value, ComputeError> {
        let url = self.endpoint(request.job_type.engine_path())?;
        tracing::debug!(job_id = %request.job_id, %url, "Calling compute engine");

        let response = self.client.post(url).json(request).send().await.map_err(|e| {
            if e.is_timeout() {
                ComputeError::Timeout(self.timeout)
            } else {
                ComputeError::Request(e)
            }
        })?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let mut message = body.trim().to_string();
            if message.len() > MAX_ERROR_BODY_LEN {
                let cut = (0..=MAX_ERROR_BODY_LEN).rev().find(|i| message.is_char_boundary(*i)).unwrap_or(0);
                message.truncate(cut);
            }
            return Err(ComputeError::Engine { status: status.as_u16(), message });
        }

        serde_json::from_str(&body).map_err(|e| ComputeError::InvalidResponse(e.to_string()))
    }

    async fn health_check(&self) -> Result<(), ComputeError> {
        let response = self.client.get(self.endpoint("health")?).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ComputeError::Engine { status: response.status().as_u16(), message: "health check failed".into() })
        }
    }
}
