use gs_core::{Job, JobState};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

/// Snapshot of a job at the moment the tracker reported it.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Progress(Job),
    Completed(Job),
    Failed(Job),
    Cancelled(Job),
}

impl JobEvent {
    pub fn from_job(job: &Job) -> Self {
        let job = job.clone();
        match job.state() {
            JobState::Submitted | JobState::Polling => Self::Progress(job),
            JobState::Completed => Self::Completed(job),
            JobState::Failed => Self::Failed(job),
            JobState::Cancelled => Self::Cancelled(job),
        }
    }

    pub fn job(&self) -> &Job {
        match self {
            Self::Progress(job) | Self::Completed(job) | Self::Failed(job) | Self::Cancelled(job) => {
                job
            }
        }
    }

    pub fn into_job(self) -> Job {
        match self {
            Self::Progress(job) | Self::Completed(job) | Self::Failed(job) | Self::Cancelled(job) => {
                job
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

/// Receives job updates from a poll loop.
///
/// Called from the tracker's task, so implementations must not block.
pub trait JobObserver: Send + Sync {
    fn on_update(&self, job: &Job);
}

impl<F> JobObserver for F
where
    F: Fn(&Job) + Send + Sync,
{
    fn on_update(&self, job: &Job) {
        self(job)
    }
}

/// Forwards updates as [`JobEvent`]s to whoever owns the receiver.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: UnboundedSender<JobEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, UnboundedReceiver<JobEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn from_sender(tx: UnboundedSender<JobEvent>) -> Self {
        Self { tx }
    }
}

impl JobObserver for ChannelObserver {
    fn on_update(&self, job: &Job) {
        if self.tx.send(JobEvent::from_job(job)).is_err() {
            trace!(job_id = %job.id(), "Event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gs_core::{JobId, JobKind};

    #[test]
    fn test_event_follows_state() {
        let mut job = Job::submitted(JobId::new("a"), JobKind::Video);
        job.start_polling().unwrap();
        assert!(matches!(JobEvent::from_job(&job), JobEvent::Progress(_)));

        job.cancel();
        let event = JobEvent::from_job(&job);
        assert!(event.is_terminal());
        assert!(matches!(event, JobEvent::Cancelled(_)));
        assert_eq!(event.into_job().id().as_str(), "a");
    }

    #[test]
    fn test_channel_observer_forwards() {
        let (observer, mut rx) = ChannelObserver::new();
        let job = Job::submitted(JobId::new("b"), JobKind::Text);
        observer.on_update(&job);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.job().id(), job.id());
    }

    #[test]
    fn test_closure_observer() {
        let seen = std::sync::Mutex::new(Vec::new());
        let observer = |job: &Job| seen.lock().unwrap().push(job.id().clone());
        observer.on_update(&Job::submitted(JobId::new("c"), JobKind::Image));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
