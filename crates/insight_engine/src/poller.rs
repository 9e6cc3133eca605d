use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use insight_core::{accepts_transition, JobId, JobStatus};
use insight_logging::{insight_debug, insight_trace, insight_warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// One fetch of a polled job.
#[async_trait::async_trait]
pub trait PollFetch: Send + Sync {
    /// Returns the fetched status, or `None` when the fetch failed. A failed
    /// fetch does not end polling.
    async fn fetch_status(&self, job_id: &str) -> Option<JobStatus>;
}

struct PollHandle {
    known: Arc<watch::Sender<Option<JobStatus>>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Fixed-interval fallback polling, one task per job.
///
/// A job's loop ends when its known status becomes terminal (from its own
/// fetches or from [`PollingEngine::observe`]) or when it is stopped.
pub struct PollingEngine {
    interval: Duration,
    jobs: HashMap<JobId, PollHandle>,
}

/// Shortest accepted poll period; a zero period would stall the timer.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

impl PollingEngine {
    /// Periods below [`MIN_POLL_INTERVAL`] are raised to it.
    pub fn new(interval: Duration) -> Self {
        if interval < MIN_POLL_INTERVAL {
            insight_warn!("Poll interval {interval:?} is too short; using {MIN_POLL_INTERVAL:?}");
        }
        Self {
            interval: interval.max(MIN_POLL_INTERVAL),
            jobs: HashMap::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts polling `job_id`. A job that is already polled keeps its loop.
    pub fn start(&mut self, job_id: JobId, fetch: Arc<dyn PollFetch>) {
        self.reap_finished();
        if self.jobs.contains_key(&job_id) {
            return;
        }

        let (known, _) = watch::channel(None);
        let known = Arc::new(known);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop(
            job_id.clone(),
            self.interval,
            fetch,
            known.clone(),
            cancel.clone(),
        ));
        insight_debug!("Polling {job_id} every {:?}", self.interval);
        self.jobs.insert(
            job_id,
            PollHandle {
                known,
                cancel,
                task,
            },
        );
    }

    /// Feeds a status learned elsewhere (push, manual refresh) to the loop.
    pub fn observe(&self, job_id: &str, status: JobStatus) {
        if let Some(handle) = self.jobs.get(job_id) {
            record(&handle.known, status);
        }
    }

    pub fn stop(&mut self, job_id: &str) {
        if let Some(handle) = self.jobs.remove(job_id) {
            insight_debug!("Stopped polling {job_id}");
            handle.cancel.cancel();
        }
    }

    pub fn stop_all(&mut self) {
        for (_, handle) in self.jobs.drain() {
            handle.cancel.cancel();
        }
    }

    pub fn is_polling(&self, job_id: &str) -> bool {
        self.jobs
            .get(job_id)
            .is_some_and(|handle| !handle.task.is_finished())
    }

    fn reap_finished(&mut self) {
        self.jobs.retain(|_, handle| !handle.task.is_finished());
    }
}

impl Drop for PollingEngine {
    fn drop(&mut self) {
        self.stop_all();
    }
}

fn record(known: &watch::Sender<Option<JobStatus>>, status: JobStatus) {
    known.send_if_modified(|current| {
        if accepts_transition(*current, status) && *current != Some(status) {
            *current = Some(status);
            true
        } else {
            false
        }
    });
}

async fn poll_loop(
    job_id: JobId,
    interval: Duration,
    fetch: Arc<dyn PollFetch>,
    known: Arc<watch::Sender<Option<JobStatus>>>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut status_rx = known.subscribe();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
            Ok(()) = status_rx.changed() => {
                let status = *status_rx.borrow_and_update();
                if status.is_some_and(JobStatus::is_terminal) {
                    break;
                }
                continue;
            }
        }

        let status = *known.borrow();
        if status.is_some_and(JobStatus::is_terminal) {
            break;
        }
        insight_trace!("Poll tick for {job_id}");
        let fetched = tokio::select! {
            _ = cancel.cancelled() => return,
            status = fetch.fetch_status(&job_id) => status,
        };
        if let Some(status) = fetched {
            record(&known, status);
        }
    }
    insight_debug!("Job {job_id} is terminal; polling ended");
}
