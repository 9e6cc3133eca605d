use crate::{FailureKind, FetchOrigin, Job, JobId};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// First watched job appeared; the shared push channel is needed.
    AcquireChannel,
    /// Last watched job went away; the shared push channel may close.
    ReleaseChannel,
    Subscribe { job_id: JobId },
    Unsubscribe { job_id: JobId },
    FetchJob { job_id: JobId, origin: FetchOrigin },
    StartPolling { job_id: JobId },
    StopPolling { job_id: JobId },
    /// An accepted transition; observers are notified synchronously.
    JobChanged { job: Job },
    /// A non-fatal fetch failure surfaced to observers.
    FetchFailed {
        job_id: JobId,
        kind: FailureKind,
        message: String,
    },
}
