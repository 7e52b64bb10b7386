//! Caller-owned listing of jobs, the backing model of a jobs dashboard.
//!
//! The board never talks to a tracker directly. It is fed [`JobEvent`]s (usually
//! from a [`ChannelObserver`](crate::events::ChannelObserver) receiver) and
//! mutated only by its owner.

use std::collections::HashMap;
use std::fmt;

use gs_core::{Job, JobId, JobState};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::backend::{GenerationBackend, StatusReport};
use crate::error::BackendError;
use crate::events::JobEvent;
use crate::tracker::apply_report;

#[derive(Debug, Default)]
pub struct JobBoard {
    jobs: HashMap<JobId, Job>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoardStats {
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

impl fmt::Display for BoardStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Active: {} | Completed: {} | Failed: {}",
            self.active, self.completed, self.failed
        )
    }
}

impl JobBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get(&self, id: &JobId) -> Option<&Job> {
        self.jobs.get(id)
    }

    pub fn upsert(&mut self, job: Job) {
        self.jobs.insert(job.id().clone(), job);
    }

    /// Cancelled jobs leave the board; everything else is stored as reported.
    pub fn apply(&mut self, event: JobEvent) {
        match event {
            JobEvent::Cancelled(job) => {
                debug!(job_id = %job.id(), "Dropping cancelled job from board");
                self.jobs.remove(job.id());
            }
            other => self.upsert(other.into_job()),
        }
    }

    /// Apply every event already waiting in `rx`. Returns how many were applied.
    pub fn drain(&mut self, rx: &mut UnboundedReceiver<JobEvent>) -> usize {
        let mut applied = 0;
        while let Ok(event) = rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// All jobs, newest first.
    pub fn jobs(&self) -> Vec<&Job> {
        let mut jobs: Vec<&Job> = self.jobs.values().collect();
        jobs.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        jobs
    }

    pub fn active(&self) -> Vec<&Job> {
        self.jobs()
            .into_iter()
            .filter(|job| job.state().is_active())
            .collect()
    }

    pub fn finished(&self) -> Vec<&Job> {
        self.jobs()
            .into_iter()
            .filter(|job| job.is_terminal())
            .collect()
    }

    pub fn stats(&self) -> BoardStats {
        self.jobs
            .values()
            .fold(BoardStats::default(), |mut stats, job| {
                match job.state() {
                    JobState::Submitted | JobState::Polling => stats.active += 1,
                    JobState::Completed => stats.completed += 1,
                    JobState::Failed => stats.failed += 1,
                    JobState::Cancelled => {}
                }
                stats
            })
    }

    pub fn remove(&mut self, id: &JobId) -> Option<Job> {
        self.jobs.remove(id)
    }

    /// Delete a job server-side, then drop it locally.
    ///
    /// A job the backend no longer knows is still removed from the board.
    pub async fn delete(
        &mut self,
        id: &JobId,
        backend: &dyn GenerationBackend,
    ) -> Result<Option<Job>, BackendError> {
        match backend.delete(id).await {
            Ok(()) => info!(job_id = %id, "Deleted job"),
            Err(BackendError::NotFound(_)) => warn!(job_id = %id, "Job already gone on backend"),
            Err(e) => return Err(e),
        }
        Ok(self.jobs.remove(id))
    }

    /// Remove completed and failed jobs locally.
    pub fn clear_finished(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, job| !job.is_terminal());
        before - self.jobs.len()
    }

    /// Add jobs listed by the backend that the board does not hold yet.
    ///
    /// Jobs already on the board are left alone; their tracker is fresher.
    pub async fn load_from(&mut self, backend: &dyn GenerationBackend) -> Result<usize, BackendError> {
        let reports = backend.list().await?;
        let mut added = 0;

        for report in &reports {
            let Some(job) = job_from_report(report) else {
                continue;
            };
            if self.jobs.contains_key(job.id()) {
                continue;
            }
            self.upsert(job);
            added += 1;
        }

        debug!(listed = reports.len(), added, "Loaded jobs from backend");
        Ok(added)
    }
}

/// Rebuild a job from a listing entry. Entries without an id are skipped.
pub fn job_from_report(report: &StatusReport) -> Option<Job> {
    let id = report.job_id.as_deref().filter(|id| !id.is_empty())?;
    let mut job = Job::submitted(JobId::new(id), report.kind.unwrap_or_default());
    job.start_polling().ok()?;

    if let Err(e) = apply_report(&mut job, report) {
        warn!(job_id = %id, error = %e, "Skipping unusable listing entry");
        return None;
    }
    Some(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::GenerationRequest;
    use crate::events::{ChannelObserver, JobObserver};
    use async_trait::async_trait;
    use gs_core::{JobError, JobKind};
    use parking_lot::Mutex;
    use serde_json::json;

    fn job(id: &str, state: JobState) -> Job {
        let mut job = Job::submitted(JobId::new(id), JobKind::Video);
        job.start_polling().unwrap();
        match state {
            JobState::Completed => job.complete(json!("url")).unwrap(),
            JobState::Failed => job.fail(JobError::backend_reported("boom", None)).unwrap(),
            JobState::Cancelled => {
                job.cancel();
            }
            _ => {}
        }
        job
    }

    #[derive(Default)]
    struct ListingBackend {
        listing: Vec<StatusReport>,
        deleted: Mutex<Vec<JobId>>,
        missing: bool,
    }

    #[async_trait]
    impl GenerationBackend for ListingBackend {
        async fn submit(&self, _request: &GenerationRequest) -> Result<JobId, BackendError> {
            Ok(JobId::new("unused"))
        }

        async fn status(&self, id: &JobId) -> Result<StatusReport, BackendError> {
            Err(BackendError::NotFound(id.clone()))
        }

        async fn delete(&self, id: &JobId) -> Result<(), BackendError> {
            if self.missing {
                return Err(BackendError::NotFound(id.clone()));
            }
            self.deleted.lock().push(id.clone());
            Ok(())
        }

        async fn list(&self) -> Result<Vec<StatusReport>, BackendError> {
            Ok(self.listing.clone())
        }
    }

    #[test]
    fn test_cancelled_events_leave_board() {
        let mut board = JobBoard::new();
        board.apply(JobEvent::from_job(&job("a", JobState::Polling)));
        assert_eq!(board.len(), 1);

        board.apply(JobEvent::from_job(&job("a", JobState::Cancelled)));
        assert!(board.is_empty());
    }

    #[test]
    fn test_stats_and_filters() {
        let mut board = JobBoard::new();
        board.upsert(job("a", JobState::Polling));
        board.upsert(job("b", JobState::Completed));
        board.upsert(job("c", JobState::Failed));

        let stats = board.stats();
        assert_eq!(stats, BoardStats { active: 1, completed: 1, failed: 1 });
        assert_eq!(stats.to_string(), "Active: 1 | Completed: 1 | Failed: 1");
        assert_eq!(board.active().len(), 1);
        assert_eq!(board.finished().len(), 2);

        assert_eq!(board.clear_finished(), 2);
        assert_eq!(board.jobs()[0].id().as_str(), "a");
    }

    #[test]
    fn test_drain_applies_pending_events() {
        let (observer, mut rx) = ChannelObserver::new();
        observer.on_update(&job("a", JobState::Polling));
        observer.on_update(&job("a", JobState::Completed));

        let mut board = JobBoard::new();
        assert_eq!(board.drain(&mut rx), 2);
        assert_eq!(board.get(&JobId::new("a")).unwrap().state(), JobState::Completed);
    }

    #[tokio::test]
    async fn test_delete_removes_locally_even_if_missing_remotely() {
        let backend = ListingBackend {
            missing: true,
            ..Default::default()
        };
        let mut board = JobBoard::new();
        board.upsert(job("a", JobState::Completed));

        let removed = board.delete(&JobId::new("a"), &backend).await.unwrap();
        assert!(removed.is_some());
        assert!(board.is_empty());
    }

    #[tokio::test]
    async fn test_delete_calls_backend() {
        let backend = ListingBackend::default();
        let mut board = JobBoard::new();
        board.upsert(job("a", JobState::Failed));

        board.delete(&JobId::new("a"), &backend).await.unwrap();
        assert_eq!(backend.deleted.lock().as_slice(), &[JobId::new("a")]);
    }

    #[tokio::test]
    async fn test_load_from_listing() {
        let mut done = StatusReport::completed(json!("https://x/a.mp4"));
        done.job_id = Some("a".into());
        let mut running = StatusReport::processing(42.0);
        running.job_id = Some("b".into());
        running.kind = Some(JobKind::Music);
        let anonymous = StatusReport::processing(5.0);

        let backend = ListingBackend {
            listing: vec![done, running, anonymous],
            ..Default::default()
        };

        let mut board = JobBoard::new();
        board.upsert(job("a", JobState::Polling));

        assert_eq!(board.load_from(&backend).await.unwrap(), 1);
        assert_eq!(board.len(), 2);
        // Existing entry untouched.
        assert_eq!(board.get(&JobId::new("a")).unwrap().state(), JobState::Polling);

        let listed = board.get(&JobId::new("b")).unwrap();
        assert_eq!(listed.kind(), JobKind::Music);
        assert_eq!(listed.progress(), 42);
    }
}
