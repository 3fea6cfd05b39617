use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use url::Url;
use uuid::Uuid;

use crate::error::ApiError;
use crate::types::{
    JobDetailsResponse, JobFamily, JobWithResult, RecentJobsResponse, SimulateRequest, SubmitJobResponse,
};

/// The dispatcher's REST surface as seen by a client.
#[async_trait]
pub trait JobsApi: Send + Sync {
    /// `GET /jobs/recent`
    async fn fetch_recent(&self) -> Result<RecentJobsResponse, ApiError>;
    /// `GET /jobs/{id}/details`
    async fn fetch_details(&self, id: Uuid) -> Result<JobWithResult, ApiError>;
    /// `POST /jobs/{id}/cancel`
    async fn cancel(&self, id: Uuid) -> Result<(), ApiError>;
    /// `POST /{family}/simulate`
    async fn submit(&self, family: JobFamily, request: &SimulateRequest) -> Result<SubmitJobResponse, ApiError>;
}

#[derive(Debug, Clone)]
pub struct HttpJobsApi {
    client: Client,
    base_url: Url,
}

impl HttpJobsApi {
    pub fn new(base_url: Url, request_timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ApiError::from_reqwest_error("build_client", e))?;
        Ok(Self { client, base_url })
    }

    pub fn with_client(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Url(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn read_json<T: DeserializeOwned>(operation: &'static str, response: Response) -> Result<T, ApiError> {
        let status = response.status();
        let body = response.text().await.map_err(|e| ApiError::from_reqwest_error(operation, e))?;
        if !status.is_success() {
            tracing::debug!(operation, status = status.as_u16(), "Job API request failed");
            return Err(ApiError::from_status(operation, status, &body));
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Decode { operation, message: e.to_string() })
    }
}

#[async_trait]
impl JobsApi for HttpJobsApi {
    async fn fetch_recent(&self) -> Result<RecentJobsResponse, ApiError> {
        const OP: &str = "fetch_recent";
        let url = self.endpoint(&["jobs", "recent"])?;
        let response = self.client.get(url).send().await.map_err(|e| ApiError::from_reqwest_error(OP, e))?;
        Self::read_json(OP, response).await
    }

    async fn fetch_details(&self, id: Uuid) -> Result<JobWithResult, ApiError> {
        const OP: &str = "fetch_details";
        let id = id.to_string();
        let url = self.endpoint(&["jobs", &id, "details"])?;
        let response = self.client.get(url).send().await.map_err(|e| ApiError::from_reqwest_error(OP, e))?;
        let details: JobDetailsResponse = Self::read_json(OP, response).await?;
        Ok(details.job)
    }

    async fn cancel(&self, id: Uuid) -> Result<(), ApiError> {
        const OP: &str = "cancel";
        let id = id.to_string();
        let url = self.endpoint(&["jobs", &id, "cancel"])?;
        let response = self.client.post(url).send().await.map_err(|e| ApiError::from_reqwest_error(OP, e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(OP, status, &body))
    }

    async fn submit(&self, family: JobFamily, request: &SimulateRequest) -> Result<SubmitJobResponse, ApiError> {
        const OP: &str = "submit";
        let family = family.to_string();
        let url = self.endpoint(&[&family, "simulate"])?;
        let response =
            self.client.post(url).json(request).send().await.map_err(|e| ApiError::from_reqwest_error(OP, e))?;
        Self::read_json(OP, response).await
    }
}
