use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::JobKind;
use crate::progress::MAX_PROGRESS;

/// Opaque identifier assigned by the generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Submitted,
    Polling,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Submitted | Self::Polling)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "SUBMITTED",
            Self::Polling => "POLLING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Submitted => "📤",
            Self::Polling => "⚡",
            Self::Completed => "✅",
            Self::Failed => "❌",
            Self::Cancelled => "⏹",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobErrorKind {
    /// The backend explicitly reported the job as failed.
    BackendReported,
    /// Too many consecutive status checks failed.
    PollingExhausted,
}

/// Terminal failure stored on a [`Job`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct JobError {
    pub kind: JobErrorKind,
    pub message: String,
    pub code: Option<String>,
}

impl JobError {
    pub fn backend_reported(message: impl Into<String>, code: Option<String>) -> Self {
        Self {
            kind: JobErrorKind::BackendReported,
            message: message.into(),
            code,
        }
    }

    pub fn polling_exhausted(failures: u32, last_error: impl fmt::Display) -> Self {
        Self {
            kind: JobErrorKind::PollingExhausted,
            message: format!(
                "status polling failed {failures} consecutive times (last error: {last_error})"
            ),
            code: Some("polling_exhausted".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("job {id} cannot move from {from} to {to}")]
pub struct TransitionError {
    pub id: JobId,
    pub from: JobState,
    pub to: JobState,
}

/// One tracked generation request.
///
/// Fields are private so the state machine is the only way to mutate a job:
/// `result` exists only in `Completed`, `error` only in `Failed`, and nothing
/// leaves a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    id: JobId,
    kind: JobKind,
    state: JobState,
    progress: u8,
    message: Option<String>,
    result: Option<Value>,
    error: Option<JobError>,
    created_at: DateTime<Utc>,
    last_polled_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn submitted(id: JobId, kind: JobKind) -> Self {
        Self {
            id,
            kind,
            state: JobState::Submitted,
            progress: 0,
            message: None,
            result: None,
            error: None,
            created_at: Utc::now(),
            last_polled_at: None,
            completed_at: None,
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&JobError> {
        self.error.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_polled_at(&self) -> Option<DateTime<Utc>> {
        self.last_polled_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Seconds between creation and completion, or until now while running.
    pub fn elapsed_secs(&self) -> i64 {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - self.created_at).num_seconds()
    }

    pub fn start_polling(&mut self) -> Result<(), TransitionError> {
        self.ensure(JobState::Submitted, JobState::Polling)?;
        self.state = JobState::Polling;
        Ok(())
    }

    pub fn mark_polled(&mut self, at: DateTime<Utc>) {
        if !self.is_terminal() {
            self.last_polled_at = Some(at);
        }
    }

    /// Record a non-terminal status report. Returns whether anything visible changed.
    pub fn record_progress(
        &mut self,
        progress: u8,
        message: Option<String>,
    ) -> Result<bool, TransitionError> {
        self.ensure(JobState::Polling, JobState::Polling)?;
        let progress = progress.min(MAX_PROGRESS);
        let message = message.or_else(|| self.message.clone());
        let changed = progress != self.progress || message != self.message;
        self.progress = progress;
        self.message = message;
        Ok(changed)
    }

    pub fn complete(&mut self, result: Value) -> Result<(), TransitionError> {
        self.ensure(JobState::Polling, JobState::Completed)?;
        self.state = JobState::Completed;
        self.progress = MAX_PROGRESS;
        self.result = Some(result);
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn fail(&mut self, error: JobError) -> Result<(), TransitionError> {
        self.ensure(JobState::Polling, JobState::Failed)?;
        self.state = JobState::Failed;
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Cancel a job that has not finished. Returns `false` for terminal jobs.
    pub fn cancel(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = JobState::Cancelled;
        self.completed_at = Some(Utc::now());
        true
    }

    fn ensure(&self, expected: JobState, to: JobState) -> Result<(), TransitionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(TransitionError {
                id: self.id.clone(),
                from: self.state,
                to,
            })
        }
    }
}
