use std::sync::Arc;

use chrono::Utc;
use gs_core::{Job, JobError, JobState, TransitionError};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::backend::{GenerationBackend, ReportedStatus, StatusReport};
use crate::config::{TrackerConfig, duration_millis};
use crate::error::BackendError;
use crate::events::JobObserver;
use crate::tracker::registry::PollClaim;

const UNKNOWN_FAILURE: &str = "unknown error";

/// Apply one status report to a job.
///
/// Returns whether the job visibly changed. Reports delivered to a job that
/// already finished are rejected and leave it untouched.
pub fn apply_report(job: &mut Job, report: &StatusReport) -> Result<bool, TransitionError> {
    match report.status {
        ReportedStatus::Completed => {
            if let Some(err) = &report.error {
                warn!(
                    job_id = %job.id(),
                    error = %err,
                    "Backend reported completed together with an error; treating as completed"
                );
            }
            let result = report.result.clone().unwrap_or_else(|| {
                warn!(job_id = %job.id(), "Backend reported completed without a result");
                Value::Null
            });
            job.complete(result)?;
            Ok(true)
        }
        ReportedStatus::Failed => {
            let message = report
                .error
                .clone()
                .unwrap_or_else(|| UNKNOWN_FAILURE.to_string());
            job.fail(JobError::backend_reported(message, report.code.clone()))?;
            Ok(true)
        }
        ReportedStatus::Queued | ReportedStatus::Processing => {
            job.record_progress(report.clamped_progress(), report.message.clone())
        }
    }
}

pub(crate) struct Poller {
    backend: Arc<dyn GenerationBackend>,
    config: TrackerConfig,
    job: Arc<Mutex<Job>>,
    observer: Arc<dyn JobObserver>,
    cancel_rx: watch::Receiver<bool>,
    consecutive_failures: u32,
    _claim: PollClaim,
}

impl Poller {
    pub(crate) fn new(
        backend: Arc<dyn GenerationBackend>,
        config: TrackerConfig,
        job: Arc<Mutex<Job>>,
        observer: Arc<dyn JobObserver>,
        cancel_rx: watch::Receiver<bool>,
        claim: PollClaim,
    ) -> Self {
        Self {
            backend,
            config,
            job,
            observer,
            cancel_rx,
            consecutive_failures: 0,
            _claim: claim,
        }
    }

    pub(crate) async fn run(mut self) {
        let id = self.job.lock().id().clone();
        debug!(interval_ms = duration_millis(self.config.poll_interval), "Poll loop started");

        loop {
            tokio::select! {
                biased;
                _ = self.cancel_rx.changed() => break,
                _ = sleep(self.config.poll_interval) => {}
            }

            if self.job.lock().is_terminal() {
                break;
            }

            let outcome = match timeout(self.config.request_timeout, self.backend.status(&id)).await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(BackendError::Timeout(duration_millis(
                    self.config.request_timeout,
                ))),
            };

            let update = self.apply(outcome);
            if let Some(snapshot) = update {
                self.observer.on_update(&snapshot);
                if snapshot.is_terminal() {
                    break;
                }
            } else if self.job.lock().is_terminal() {
                break;
            }
        }

        let last = self.job.lock().clone();
        if last.state() == JobState::Cancelled {
            self.observer.on_update(&last);
        }
        debug!(state = %last.state(), "Poll loop stopped");
    }

    /// Fold one tick's outcome into the job; returns a snapshot to publish.
    fn apply(&mut self, outcome: Result<StatusReport, BackendError>) -> Option<Job> {
        let mut job = self.job.lock();
        if job.is_terminal() {
            debug!(state = %job.state(), "Discarding status for finished job");
            return None;
        }
        job.mark_polled(Utc::now());

        match outcome {
            Ok(report) => {
                self.consecutive_failures = 0;
                match apply_report(&mut job, &report) {
                    Ok(true) => {
                        if job.is_terminal() {
                            info!(state = %job.state(), "Job finished");
                        } else {
                            debug!(progress = job.progress(), "Job progress");
                        }
                        Some(job.clone())
                    }
                    Ok(false) => None,
                    Err(e) => {
                        warn!(error = %e, "Ignoring status report");
                        None
                    }
                }
            }
            Err(e) => {
                self.consecutive_failures += 1;
                let failures = self.consecutive_failures;

                if failures < self.config.failure_threshold {
                    warn!(failures, error = %e, "Status poll failed; retrying on next tick");
                    return None;
                }

                error!(failures, error = %e, "Status polling exhausted");
                match job.fail(JobError::polling_exhausted(failures, &e)) {
                    Ok(()) => Some(job.clone()),
                    Err(e) => {
                        warn!(error = %e, "Could not mark job failed");
                        None
                    }
                }
            }
        }
    }
}
