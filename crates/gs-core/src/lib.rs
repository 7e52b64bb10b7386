mod job;
mod job_kind;
pub mod progress;

pub use job::{Job, JobError, JobErrorKind, JobId, JobState, TransitionError};
pub use job_kind::{JobKind, ParseJobKindError};
