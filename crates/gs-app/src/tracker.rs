//! Drives submitted jobs to a terminal state by polling the backend.
//!
//! Each tracked job gets one tokio task that sleeps for the poll interval,
//! issues a single status request, applies the report and repeats. Ticks of
//! one job never overlap; different jobs are fully independent.

mod poller;
mod registry;

pub use poller::apply_report;
pub use registry::ActivePolls;

use std::sync::Arc;

use gs_core::{Job, JobId, JobKind, JobState};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span, warn};

use crate::backend::{GenerationBackend, GenerationRequest};
use crate::config::TrackerConfig;
use crate::error::{ConfigError, TrackerError};
use crate::events::JobObserver;
use crate::tracker::poller::Poller;

/// Submits generation requests and owns their poll loops.
///
/// Cloning is cheap; clones share the backend and the set of active loops, so
/// a job id can only be polled by one loop across all clones. Separately built
/// trackers share that guarantee when given the same [`ActivePolls`].
#[derive(Clone)]
pub struct JobTracker {
    backend: Arc<dyn GenerationBackend>,
    config: TrackerConfig,
    active: ActivePolls,
}

impl JobTracker {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        config: TrackerConfig,
    ) -> Result<Self, ConfigError> {
        Self::with_registry(backend, config, ActivePolls::new())
    }

    /// Build a tracker that shares `active` with other trackers.
    pub fn with_registry(
        backend: Arc<dyn GenerationBackend>,
        config: TrackerConfig,
        active: ActivePolls,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            backend,
            config,
            active,
        })
    }

    pub fn registry(&self) -> &ActivePolls {
        &self.active
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn GenerationBackend> {
        &self.backend
    }

    pub fn is_tracking(&self, id: &JobId) -> bool {
        self.active.contains(id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Submit a request once and start polling the job it creates.
    ///
    /// A failed submit creates no job and starts no loop.
    pub async fn submit(
        &self,
        request: GenerationRequest,
        observer: impl JobObserver + 'static,
    ) -> Result<JobHandle, TrackerError> {
        let id = self
            .backend
            .submit(&request)
            .await
            .map_err(|e| {
                error!(kind = %request.kind, error = %e, "Job submission failed");
                TrackerError::Submission(e)
            })?;

        info!(job_id = %id, kind = %request.kind, "Job submitted");
        self.track(id.clone(), request.kind, observer)
            .inspect_err(|e| {
                warn!(job_id = %id, error = %e, "Backend accepted job but it cannot be tracked");
            })
    }

    /// Start polling a job the backend already knows about.
    ///
    /// Fails with [`TrackerError::AlreadyTracked`] while another loop of this
    /// tracker is polling the same id.
    pub fn track(
        &self,
        id: JobId,
        kind: JobKind,
        observer: impl JobObserver + 'static,
    ) -> Result<JobHandle, TrackerError> {
        let claim = self
            .active
            .claim(&id)
            .ok_or_else(|| TrackerError::AlreadyTracked(id.clone()))?;

        let mut job = Job::submitted(id.clone(), kind);
        job.start_polling()?;

        let job = Arc::new(Mutex::new(job));
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let poller = Poller::new(
            Arc::clone(&self.backend),
            self.config,
            Arc::clone(&job),
            Arc::new(observer),
            cancel_rx,
            claim,
        );

        let span = info_span!("poll", job_id = %id, kind = %kind);
        let task = tokio::spawn(poller.run().instrument(span));

        Ok(JobHandle {
            id,
            job,
            cancel_tx,
            task: Some(task),
        })
    }
}

/// Caller's handle on one tracked job. Dropping it cancels tracking.
pub struct JobHandle {
    id: JobId,
    job: Arc<Mutex<Job>>,
    cancel_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl JobHandle {
    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn snapshot(&self) -> Job {
        self.job.lock().clone()
    }

    pub fn state(&self) -> JobState {
        self.job.lock().state()
    }

    /// Stop tracking. The job becomes `Cancelled` unless it already finished.
    ///
    /// Safe to call repeatedly and from any thread. A status request already
    /// in flight is allowed to finish but its result is discarded.
    pub fn cancel(&self) {
        let cancelled = self.job.lock().cancel();
        if cancelled {
            info!(job_id = %self.id, "Job cancelled");
        }
        self.cancel_tx.send_replace(true);
    }

    /// Whether the poll loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Wait for the poll loop to exit and return the final job.
    pub async fn wait(&mut self) -> Job {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(job_id = %self.id, error = %e, "Poll task ended abnormally");
            }
        }
        self.snapshot()
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
