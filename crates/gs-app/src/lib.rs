pub mod backend;
pub mod board;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod server;
pub mod telemetry;
pub mod tracker;

pub use backend::{GenerationBackend, GenerationRequest, HttpBackend, StatusReport};
pub use board::JobBoard;
pub use config::{AppConfig, TrackerConfig};
pub use error::{BackendError, ConfigError, TrackerError};
pub use events::{ChannelObserver, JobEvent, JobObserver};
pub use tracker::{JobHandle, JobTracker};
