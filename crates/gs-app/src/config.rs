use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Polling behaviour shared by every job a tracker drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    pub poll_interval: Duration,
    /// Upper bound on a single status request.
    pub request_timeout: Duration,
    /// Consecutive failed ticks tolerated before the job fails.
    pub failure_threshold: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_POLL_INTERVAL,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(invalid("poll interval", "greater than zero", "0"));
        }
        if self.request_timeout.is_zero() {
            return Err(invalid("request timeout", "greater than zero", "0"));
        }
        if self.failure_threshold == 0 {
            return Err(invalid("failure threshold", "at least 1", "0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend_url: String,
    /// Port the simulated backend listens on.
    pub port: u16,
    pub tracker: TrackerConfig,
    pub json_logs: bool,
}

impl AppConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend_url = lookup("GS_BACKEND_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        let port = parse_or(&lookup, "GS_PORT", "a port number", DEFAULT_PORT)?;

        let poll_interval = Duration::from_millis(parse_or(
            &lookup,
            "GS_POLL_INTERVAL_MS",
            "a number of milliseconds",
            duration_millis(DEFAULT_POLL_INTERVAL),
        )?);

        // The timeout follows the interval unless set explicitly.
        let request_timeout = Duration::from_millis(parse_or(
            &lookup,
            "GS_REQUEST_TIMEOUT_MS",
            "a number of milliseconds",
            duration_millis(poll_interval),
        )?);

        let failure_threshold = parse_or(
            &lookup,
            "GS_FAILURE_THRESHOLD",
            "a positive integer",
            DEFAULT_FAILURE_THRESHOLD,
        )?;

        let json_logs = lookup("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let tracker = TrackerConfig {
            poll_interval,
            request_timeout,
            failure_threshold,
        };
        tracker.validate()?;

        Ok(Self {
            backend_url,
            port,
            tracker,
            json_logs,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| invalid(name, expected, &raw)),
        None => Ok(default),
    }
}

fn invalid(name: &'static str, expected: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        expected,
        value: value.to_string(),
    }
}
