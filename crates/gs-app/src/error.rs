use gs_core::{JobId, TransitionError};
use thiserror::Error;

/// Failure talking to the generation backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("request to backend failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend response could not be decoded: {0}")]
    Decode(String),

    #[error("backend request timed out after {0} ms")]
    Timeout(u64),

    #[error("job not found on backend: {0}")]
    NotFound(JobId),

    #[error("invalid backend URL: {0}")]
    InvalidUrl(String),

    #[error("job id {0:?} cannot be used in a request path")]
    InvalidJobId(JobId),
}

#[derive(Error, Debug)]
pub enum TrackerError {
    /// The initial submit call failed; no job exists and nothing is polled.
    #[error("submission failed: {0}")]
    Submission(#[source] BackendError),

    #[error("job {0} is already being tracked")]
    AlreadyTracked(JobId),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read .env file: {0}")]
    DotEnv(#[from] dotenvy::Error),

    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}
