use insight_core::{accepts_transition, Job, JobStatus};
use insight_logging::{insight_trace, insight_warn};

use crate::{JobService, PollBudget, PollError};

/// Progress reported after each fetch of [`poll_until_complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollProgress {
    /// 1-based attempt number.
    pub attempt: u32,
    pub status: JobStatus,
}

/// Polls `job_id` until it completes, for clients without a push channel.
///
/// Status reports that move backwards are ignored. Transient fetch errors
/// use up an attempt and polling continues. Other fetch errors (unknown job,
/// bad request, undecodable body) are not retried and end the wait with
/// [`PollError::Fetch`]. The fallback poller of [`crate::SyncEngine`] keeps
/// polling through them instead.
/// After `budget.max_attempts` fetches without a terminal status the wait
/// ends with [`PollError::Timeout`].
pub async fn poll_until_complete<F>(
    service: &dyn JobService,
    job_id: &str,
    budget: PollBudget,
    mut on_progress: F,
) -> Result<Job, PollError>
where
    F: FnMut(PollProgress),
{
    let mut last: Option<JobStatus> = None;

    for attempt in 1..=budget.max_attempts {
        if attempt > 1 {
            tokio::time::sleep(budget.interval).await;
        }
        insight_trace!("Polling {job_id}, attempt {attempt}/{}", budget.max_attempts);

        let job = match service.get_job(job_id).await {
            Ok(job) => job,
            Err(err) if err.is_transient() => {
                insight_warn!("Poll attempt {attempt} for {job_id} failed: {err}");
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        if !accepts_transition(last, job.status) {
            insight_trace!("Ignoring stale status {} for {job_id}", job.status);
            continue;
        }
        last = Some(job.status);
        on_progress(PollProgress {
            attempt,
            status: job.status,
        });

        match job.status {
            JobStatus::Completed => return Ok(job),
            JobStatus::Failed => {
                return Err(PollError::JobFailed {
                    job_id: job_id.to_string(),
                    message: job.error.unwrap_or_else(|| "Job failed".to_string()),
                })
            }
            JobStatus::Throttled => {
                insight_warn!("Job {job_id} is throttled due to high usage; still waiting");
            }
            JobStatus::Pending | JobStatus::Processing => {}
        }
    }

    Err(PollError::Timeout {
        job_id: job_id.to_string(),
        attempts: budget.max_attempts,
    })
}
