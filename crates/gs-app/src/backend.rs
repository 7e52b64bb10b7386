mod http;
mod schemas;

pub use http::HttpBackend;
pub use schemas::{GenerationRequest, JobListResponse, ReportedStatus, StatusReport, SubmitResponse};

use async_trait::async_trait;
use gs_core::JobId;

use crate::error::BackendError;

/// The remote service that actually runs generations.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// `POST /submit`
    async fn submit(&self, request: &GenerationRequest) -> Result<JobId, BackendError>;

    /// `GET /status/{job_id}`
    async fn status(&self, id: &JobId) -> Result<StatusReport, BackendError>;

    /// `DELETE /jobs/{job_id}`
    async fn delete(&self, id: &JobId) -> Result<(), BackendError>;

    /// `GET /jobs`
    async fn list(&self) -> Result<Vec<StatusReport>, BackendError>;
}
