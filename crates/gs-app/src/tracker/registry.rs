use std::collections::HashSet;
use std::sync::Arc;

use gs_core::JobId;
use parking_lot::Mutex;

/// Ids with a live poll loop.
///
/// Trackers built from the same registry (or cloned from one another) never
/// poll the same id at once.
#[derive(Debug, Clone, Default)]
pub struct ActivePolls {
    ids: Arc<Mutex<HashSet<JobId>>>,
}

impl ActivePolls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `id`; `None` if a loop already owns it.
    pub(crate) fn claim(&self, id: &JobId) -> Option<PollClaim> {
        if !self.ids.lock().insert(id.clone()) {
            return None;
        }
        Some(PollClaim {
            ids: Arc::clone(&self.ids),
            id: id.clone(),
        })
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.ids.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }
}

/// Releases the id when the owning loop ends.
#[derive(Debug)]
pub(crate) struct PollClaim {
    ids: Arc<Mutex<HashSet<JobId>>>,
    id: JobId,
}

impl Drop for PollClaim {
    fn drop(&mut self) {
        self.ids.lock().remove(&self.id);
    }
}
