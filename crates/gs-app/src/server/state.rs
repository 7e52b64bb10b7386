use std::collections::HashMap;

use chrono::{DateTime, Utc};
use gs_core::JobKind;
use gs_core::progress::{MAX_PROGRESS, ProgressStage};
use parking_lot::Mutex;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::backend::{ReportedStatus, StatusReport};

const DEFAULT_FAILURE: &str = "simulated failure";
/// Progress at which a job asked to fail gives up.
const FAILURE_POINT: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Progress added by every status request.
    pub progress_step: u8,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { progress_step: 25 }
    }
}

#[derive(Debug, Clone)]
struct SimulatedJob {
    id: String,
    kind: JobKind,
    progress: u8,
    failure: Option<String>,
    failed: bool,
    created_at: DateTime<Utc>,
}

impl SimulatedJob {
    fn advance(&mut self, step: u8) {
        if self.failed || self.progress >= MAX_PROGRESS {
            return;
        }
        self.progress = self.progress.saturating_add(step).min(MAX_PROGRESS);

        if self.failure.is_some() && self.progress >= FAILURE_POINT {
            self.failed = true;
        }
    }

    fn report(&self) -> StatusReport {
        let mut report = if self.failed {
            StatusReport {
                code: Some("simulated".to_string()),
                ..StatusReport::failed(self.failure.as_deref().unwrap_or(DEFAULT_FAILURE))
            }
        } else if self.progress >= MAX_PROGRESS {
            StatusReport::completed(json!(format!(
                "/media/{}.{}",
                self.id,
                extension(self.kind)
            )))
        } else if self.progress == 0 {
            StatusReport {
                status: ReportedStatus::Queued,
                ..StatusReport::processing(0.0)
            }
        } else {
            StatusReport {
                message: Some(ProgressStage::from_progress(self.progress).description().to_string()),
                ..StatusReport::processing(f64::from(self.progress))
            }
        };
        report.job_id = Some(self.id.clone());
        report.kind = Some(self.kind);
        report
    }
}

fn extension(kind: JobKind) -> &'static str {
    match kind {
        JobKind::Video => "mp4",
        JobKind::Image => "png",
        JobKind::Music => "mp3",
        JobKind::Text => "txt",
    }
}

/// `simulate_failure` may be `true` or an error message.
fn requested_failure(body: &Value) -> Option<String> {
    match body.get("simulate_failure")? {
        Value::Bool(true) => Some(DEFAULT_FAILURE.to_string()),
        Value::String(message) if !message.is_empty() => Some(message.clone()),
        _ => None,
    }
}

/// Jobs held by the simulated backend. Each status request moves a job
/// forward by one step.
#[derive(Debug, Default)]
pub struct SimulatedJobs {
    jobs: Mutex<HashMap<String, SimulatedJob>>,
    config: SimulationConfig,
}

impl SimulatedJobs {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn create(&self, body: &Value) -> String {
        let kind = body
            .get("kind")
            .or_else(|| body.get("media_type"))
            .and_then(Value::as_str)
            .and_then(|kind| kind.parse().ok())
            .unwrap_or_default();

        let id = Uuid::new_v4().to_string();
        let job = SimulatedJob {
            id: id.clone(),
            kind,
            progress: 0,
            failure: requested_failure(body),
            failed: false,
            created_at: Utc::now(),
        };
        self.jobs.lock().insert(id.clone(), job);
        id
    }

    /// Advance the job and describe it. `None` for unknown ids.
    pub fn poll(&self, id: &str) -> Option<StatusReport> {
        let mut jobs = self.jobs.lock();
        let job = jobs.get_mut(id)?;
        job.advance(self.config.progress_step);
        Some(job.report())
    }

    /// Current state of every job, newest first, without advancing any.
    pub fn list(&self) -> Vec<StatusReport> {
        let jobs = self.jobs.lock();
        let mut listed: Vec<&SimulatedJob> = jobs.values().collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listed.into_iter().map(SimulatedJob::report).collect()
    }

    pub fn remove(&self, id: &str) -> bool {
        self.jobs.lock().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jobs(step: u8) -> SimulatedJobs {
        SimulatedJobs::new(SimulationConfig { progress_step: step })
    }

    #[test]
    fn test_job_completes_after_enough_polls() {
        let jobs = jobs(40);
        let id = jobs.create(&json!({ "kind": "image", "prompt": "a fox" }));

        assert_eq!(jobs.poll(&id).unwrap().progress, Some(40.0));
        assert_eq!(jobs.poll(&id).unwrap().status, ReportedStatus::Processing);

        let done = jobs.poll(&id).unwrap();
        assert_eq!(done.status, ReportedStatus::Completed);
        assert_eq!(done.kind, Some(JobKind::Image));
        assert_eq!(done.result, Some(json!(format!("/media/{id}.png"))));

        // Finished jobs stay finished.
        assert_eq!(jobs.poll(&id).unwrap().status, ReportedStatus::Completed);
    }

    #[test]
    fn test_requested_failure() {
        let jobs = jobs(25);
        let id = jobs.create(&json!({ "simulate_failure": "GPU on fire" }));

        assert_eq!(jobs.poll(&id).unwrap().status, ReportedStatus::Processing);
        let failed = jobs.poll(&id).unwrap();
        assert_eq!(failed.status, ReportedStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("GPU on fire"));
        assert_eq!(failed.code.as_deref(), Some("simulated"));
    }

    #[test]
    fn test_listing_does_not_advance() {
        let jobs = jobs(25);
        let id = jobs.create(&json!({ "media_type": "music" }));

        let listed = jobs.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, ReportedStatus::Queued);
        assert_eq!(listed[0].job_id.as_deref(), Some(id.as_str()));
        assert_eq!(listed[0].kind, Some(JobKind::Music));
    }

    #[test]
    fn test_unknown_and_removed_ids() {
        let jobs = jobs(25);
        assert!(jobs.poll("missing").is_none());

        let id = jobs.create(&json!({}));
        assert!(jobs.remove(&id));
        assert!(!jobs.remove(&id));
        assert!(jobs.is_empty());
    }
}
