use crate::{Job, JobId, JobKind, JobStatus};

/// One row of a job history listing.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRowView {
    pub job_id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub label: String,
    pub tokens: u64,
    pub cost: f64,
    pub cached: bool,
    pub created_at: Option<String>,
}

impl From<&Job> for JobRowView {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.job_id.clone(),
            kind: job.kind,
            status: job.status,
            label: job.file_path.clone().unwrap_or_else(|| job.job_id.clone()),
            tokens: job.total_tokens(),
            cost: job.estimated_cost,
            cached: job.cache_hit,
            created_at: job.created_at.clone(),
        }
    }
}

/// Aggregates over a user's job history.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobStats {
    pub total_jobs: usize,
    pub total_tokens: u64,
    pub total_cost: f64,
    /// Lint issues across completed jobs.
    pub total_issues: usize,
    pub completed: usize,
    pub failed: usize,
    pub processing: usize,
    pub pending: usize,
    /// Percentage in `0.0..=100.0`.
    pub cache_hit_rate: f64,
}

impl JobStats {
    pub fn from_jobs(jobs: &[Job]) -> Self {
        let mut stats = JobStats {
            total_jobs: jobs.len(),
            ..JobStats::default()
        };
        let mut cache_hits = 0usize;

        for job in jobs {
            stats.total_tokens += job.total_tokens();
            stats.total_cost += job.estimated_cost;
            if job.cache_hit {
                cache_hits += 1;
            }
            match job.status {
                JobStatus::Completed => {
                    stats.completed += 1;
                    stats.total_issues += job.lint_issues().len();
                }
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Pending | JobStatus::Throttled => stats.pending += 1,
            }
        }

        if stats.total_jobs > 0 {
            stats.cache_hit_rate = cache_hits as f64 / stats.total_jobs as f64 * 100.0;
        }
        stats
    }
}
