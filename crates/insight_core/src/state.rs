use std::collections::BTreeMap;

use crate::{Job, JobId, JobStatus};

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct TrackedJob {
    pub(crate) observers: usize,
    pub(crate) snapshot: Option<Job>,
    pub(crate) polling: bool,
    pub(crate) last_error: Option<String>,
}

impl TrackedJob {
    pub(crate) fn status(&self) -> Option<JobStatus> {
        self.snapshot.as_ref().map(|job| job.status)
    }
}

/// Local, eventually-consistent view of every watched job.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SyncState {
    pub(crate) jobs: BTreeMap<JobId, TrackedJob>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job(&self, job_id: &str) -> Option<&Job> {
        self.jobs.get(job_id).and_then(|tracked| tracked.snapshot.as_ref())
    }

    /// Latest accepted status; `None` until the first snapshot arrives.
    pub fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.get(job_id).and_then(TrackedJob::status)
    }

    pub fn observers(&self, job_id: &str) -> usize {
        self.jobs.get(job_id).map_or(0, |tracked| tracked.observers)
    }

    pub fn is_polling(&self, job_id: &str) -> bool {
        self.jobs.get(job_id).is_some_and(|tracked| tracked.polling)
    }

    pub fn last_error(&self, job_id: &str) -> Option<&str> {
        self.jobs
            .get(job_id)
            .and_then(|tracked| tracked.last_error.as_deref())
    }

    pub fn watched_jobs(&self) -> impl Iterator<Item = &JobId> {
        self.jobs.keys()
    }

    pub fn has_watches(&self) -> bool {
        !self.jobs.is_empty()
    }
}
