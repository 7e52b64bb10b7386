#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use gs_app::backend::{GenerationBackend, GenerationRequest, StatusReport};
use gs_app::config::TrackerConfig;
use gs_app::error::BackendError;
use gs_app::events::JobObserver;
use gs_core::{Job, JobId, JobState};
use parking_lot::Mutex;

pub const INTERVAL: Duration = Duration::from_secs(2);

pub fn config() -> TrackerConfig {
    TrackerConfig {
        poll_interval: INTERVAL,
        request_timeout: INTERVAL,
        failure_threshold: 5,
    }
}

/// What the fake backend does on one status request.
#[derive(Debug, Clone)]
pub enum Step {
    Report(StatusReport),
    Fail,
    Hang,
    Delayed(Duration, StatusReport),
}

/// Backend that answers status requests from a script. The last step repeats
/// once the script runs out.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Step>>,
    fail_submit: bool,
    status_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self::build(steps.into_iter().collect(), false))
    }

    pub fn rejecting_submissions() -> Arc<Self> {
        Arc::new(Self::build(VecDeque::new(), true))
    }

    fn build(script: VecDeque<Step>, fail_submit: bool) -> Self {
        Self {
            script: Mutex::new(script),
            fail_submit,
            status_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        let mut script = self.script.lock();
        if script.len() > 1 {
            script.pop_front().unwrap_or(Step::Fail)
        } else {
            script.front().cloned().unwrap_or(Step::Fail)
        }
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn submit(&self, _request: &GenerationRequest) -> Result<JobId, BackendError> {
        if self.fail_submit {
            return Err(BackendError::Status {
                status: 500,
                body: "model offline".into(),
            });
        }
        Ok(JobId::new("job-1"))
    }

    async fn status(&self, _id: &JobId) -> Result<StatusReport, BackendError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        match self.next_step() {
            Step::Report(report) => Ok(report),
            Step::Fail => Err(BackendError::Status {
                status: 503,
                body: "unavailable".into(),
            }),
            Step::Hang => std::future::pending().await,
            Step::Delayed(delay, report) => {
                tokio::time::sleep(delay).await;
                Ok(report)
            }
        }
    }

    async fn delete(&self, _id: &JobId) -> Result<(), BackendError> {
        Ok(())
    }

    async fn list(&self) -> Result<Vec<StatusReport>, BackendError> {
        Ok(Vec::new())
    }
}

/// Observer that keeps every snapshot it is handed.
#[derive(Clone, Default)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<Job>>>,
}

impl Recorder {
    pub fn jobs(&self) -> Vec<Job> {
        self.seen.lock().clone()
    }

    pub fn states(&self) -> Vec<JobState> {
        self.seen.lock().iter().map(Job::state).collect()
    }

    pub fn progress(&self) -> Vec<u8> {
        self.seen.lock().iter().map(Job::progress).collect()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }
}

impl JobObserver for Recorder {
    fn on_update(&self, job: &Job) {
        self.seen.lock().push(job.clone());
    }
}
