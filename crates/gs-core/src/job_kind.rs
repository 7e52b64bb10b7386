use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Generation pipeline a job was submitted to.
///
/// The kind is informational only; every kind is polled the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Video,
    Image,
    Music,
    Text,
}

impl JobKind {
    /// Kind ID for API communication
    pub fn id(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Image => "image",
            Self::Music => "music",
            Self::Text => "text",
        }
    }

    /// Name for display
    pub fn name(&self) -> &'static str {
        match self {
            Self::Video => "Video",
            Self::Image => "Image",
            Self::Music => "Music",
            Self::Text => "Text",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Video => "🎬",
            Self::Image => "🖼",
            Self::Music => "🎵",
            Self::Text => "📝",
        }
    }

    /// Typical wall-clock time for a generation of this kind
    pub fn estimated_time_secs(&self) -> u32 {
        match self {
            Self::Video => 180, // 2-3 minutes
            Self::Image => 20,
            Self::Music => 60,
            Self::Text => 10,
        }
    }

    pub fn all() -> [JobKind; 4] {
        [Self::Video, Self::Image, Self::Music, Self::Text]
    }
}

impl Default for JobKind {
    fn default() -> Self {
        Self::Video
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job kind: {0}")]
pub struct ParseJobKindError(pub String);

impl FromStr for JobKind {
    type Err = ParseJobKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::all()
            .into_iter()
            .find(|kind| kind.id() == lower)
            .ok_or_else(|| ParseJobKindError(s.to_string()))
    }
}
