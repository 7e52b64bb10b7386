use gs_core::JobKind;
use gs_core::progress::clamp_progress;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A generation request. The body is opaque to the tracker and is posted as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub kind: JobKind,
    pub body: Value,
}

impl GenerationRequest {
    pub fn new(kind: JobKind, body: Value) -> Self {
        Self { kind, body }
    }

    pub fn from_prompt(kind: JobKind, prompt: impl Into<String>) -> Self {
        Self {
            kind,
            body: json!({
                "kind": kind.id(),
                "prompt": prompt.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmitResponse {
    pub job_id: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportedStatus {
    #[serde(alias = "pending")]
    Queued,
    Processing,
    Completed,
    Failed,
}

impl ReportedStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Body of `GET /status/{job_id}`; also the element type of `GET /jobs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, alias = "media_type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<JobKind>,
    pub status: ReportedStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, alias = "error_message", skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl StatusReport {
    pub fn processing(progress: f64) -> Self {
        Self {
            job_id: None,
            kind: None,
            status: ReportedStatus::Processing,
            progress: Some(progress),
            result: None,
            error: None,
            message: None,
            code: None,
        }
    }

    pub fn completed(result: Value) -> Self {
        Self {
            status: ReportedStatus::Completed,
            progress: Some(100.0),
            result: Some(result),
            ..Self::processing(100.0)
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: ReportedStatus::Failed,
            error: Some(error.into()),
            progress: None,
            ..Self::processing(0.0)
        }
    }

    /// Reported progress clamped to `0..=100`.
    pub fn clamped_progress(&self) -> u8 {
        self.progress.map(clamp_progress).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobListResponse {
    pub jobs: Vec<StatusReport>,
}
