//! Progress ingestion and the human-facing stage derived from it.

use crate::JobKind;

pub const MAX_PROGRESS: u8 = 100;

/// Clamp a backend-reported progress number into `0..=100`.
///
/// Backends report progress as an arbitrary JSON number, so fractional,
/// negative and oversized values all occur. NaN is treated as no progress.
pub fn clamp_progress(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, f64::from(MAX_PROGRESS)) as u8
}

/// Coarse phase of a running generation, keyed off its progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProgressStage {
    Initializing,
    ProcessingPrompt,
    Generating,
    Rendering,
    Finalizing,
}

impl ProgressStage {
    pub fn from_progress(progress: u8) -> Self {
        match progress {
            0..=9 => Self::Initializing,
            10..=29 => Self::ProcessingPrompt,
            30..=59 => Self::Generating,
            60..=89 => Self::Rendering,
            _ => Self::Finalizing,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing generation...",
            Self::ProcessingPrompt => "Processing your prompt...",
            Self::Generating => "Generating content...",
            Self::Rendering => "Rendering final output...",
            Self::Finalizing => "Almost done...",
        }
    }
}

/// Rough seconds left for a job of `kind` at `progress`.
pub fn estimate_remaining_secs(kind: JobKind, progress: u8) -> u32 {
    let remaining = u32::from(MAX_PROGRESS.saturating_sub(progress.min(MAX_PROGRESS)));
    kind.estimated_time_secs() * remaining / u32::from(MAX_PROGRESS)
}
