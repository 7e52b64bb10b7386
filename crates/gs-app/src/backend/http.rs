use std::time::Duration;

use async_trait::async_trait;
use gs_core::JobId;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::backend::schemas::{GenerationRequest, JobListResponse, StatusReport, SubmitResponse};
use crate::backend::GenerationBackend;
use crate::config::duration_millis;
use crate::error::BackendError;

/// [`GenerationBackend`] over the JSON HTTP contract.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let base_url = base_url.into();
        let base_url = Url::parse(&base_url)
            .map_err(|e| BackendError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append `segments` to the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// URL for a per-job endpoint. Ids that would not survive as a single
    /// path segment are refused.
    fn job_url(&self, endpoint: &str, id: &JobId) -> Result<Url, BackendError> {
        match id.as_str() {
            "" | "." | ".." => Err(BackendError::InvalidJobId(id.clone())),
            raw => Ok(self.url(&[endpoint, raw])),
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout(duration_millis(self.timeout))
        } else {
            BackendError::Request(e)
        }
    }

    async fn check(response: Response, id: Option<&JobId>) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::NOT_FOUND {
            if let Some(id) = id {
                return Err(BackendError::NotFound(id.clone()));
            }
        }

        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T, BackendError> {
        let text = response.text().await.map_err(|e| self.map_send_error(e))?;
        serde_json::from_str(&text).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    #[instrument(skip(self, request), fields(kind = %request.kind))]
    async fn submit(&self, request: &GenerationRequest) -> Result<JobId, BackendError> {
        let response = self
            .client
            .post(self.url(&["submit"]))
            .json(&request.body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let response = Self::check(response, None).await?;
        let created: SubmitResponse = self.decode(response).await?;

        if created.job_id.trim().is_empty() {
            return Err(BackendError::Decode("empty job_id in submit response".into()));
        }

        debug!(job_id = %created.job_id, "Backend accepted job");
        Ok(JobId::new(created.job_id))
    }

    async fn status(&self, id: &JobId) -> Result<StatusReport, BackendError> {
        let response = self
            .client
            .get(self.job_url("status", id)?)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let response = Self::check(response, Some(id)).await?;
        self.decode(response).await
    }

    async fn delete(&self, id: &JobId) -> Result<(), BackendError> {
        let response = self
            .client
            .delete(self.job_url("jobs", id)?)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        Self::check(response, Some(id)).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<StatusReport>, BackendError> {
        let response = self
            .client
            .get(self.url(&["jobs"]))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let response = Self::check(response, None).await?;
        let listing: JobListResponse = self.decode(response).await?;
        Ok(listing.jobs)
    }
}
