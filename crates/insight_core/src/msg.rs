use std::fmt;

use crate::{Job, JobId, JobStatus};

/// Why a job fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    Decode,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Decode => write!(f, "malformed response"),
        }
    }
}

/// Where a job snapshot fetch was triggered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOrigin {
    /// First fetch after an observer started watching.
    Initial,
    /// Re-fetch after a push `job_update`.
    Push,
    /// Polling fallback tick.
    Poll,
    /// Explicit refresh requested by an observer.
    Manual,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// An observer started watching a job.
    Watch { job_id: JobId },
    /// An observer stopped watching a job (view unmounted).
    Unwatch { job_id: JobId },
    /// An observer asked for a fresh snapshot.
    Refresh { job_id: JobId },
    /// Push channel reported a status change.
    PushUpdate { job_id: JobId, status: JobStatus },
    /// A fetch returned a snapshot.
    Fetched { job: Job, origin: FetchOrigin },
    /// A fetch failed; non-fatal.
    FetchFailed {
        job_id: JobId,
        origin: FetchOrigin,
        kind: FailureKind,
        message: String,
    },
}
