use insight_core::{FailureKind, JobId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether a later attempt may succeed. Client-side errors (bad url,
    /// 4xx other than 408/429, undecodable body) will not.
    pub fn is_transient(&self) -> bool {
        match self.kind {
            FailureKind::Timeout | FailureKind::Network => true,
            FailureKind::HttpStatus(code) => code >= 500 || code == 408 || code == 429,
            FailureKind::InvalidUrl | FailureKind::Decode => false,
        }
    }
}

/// Push transport failure. Absorbed by the channel driver, which turns it
/// into a scheduled reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("receive failed: {0}")]
    Receive(String),
}

/// Outcome of a polling-only wait that did not end in `completed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error("fetching job failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("job {job_id} failed: {message}")]
    JobFailed { job_id: JobId, message: String },
    #[error("job {job_id} timed out after {attempts} attempts: the review is taking longer than expected")]
    Timeout { job_id: JobId, attempts: u32 },
}
