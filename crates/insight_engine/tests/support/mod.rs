#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};

use futures_util::{sink, stream};
use insight_core::{Job, JobId, JobStatus};
use insight_engine::{
    Connection, Connector, EnqueueResponse, FailureKind, FetchError, JobRequest, JobService,
    TransportError,
};
use tokio::sync::mpsc;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(insight_logging::initialize_for_tests);
}

pub fn job(id: &str, status: JobStatus) -> Job {
    Job::new(id, status)
}

pub fn network_error() -> FetchError {
    FetchError {
        kind: FailureKind::Network,
        message: "connection refused".to_string(),
    }
}

/// Job service double: each job answers from a queue whose last entry repeats.
#[derive(Default)]
pub struct ScriptedService {
    responses: Mutex<HashMap<JobId, VecDeque<Result<Job, FetchError>>>>,
    calls: Mutex<HashMap<JobId, usize>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, job_id: &str, response: Result<Job, FetchError>) {
        self.responses
            .lock()
            .unwrap()
            .entry(job_id.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn push_status(&self, job_id: &str, status: JobStatus) {
        self.push(job_id, Ok(job(job_id, status)));
    }

    /// Replaces the script with a single repeating answer.
    pub fn set_status(&self, job_id: &str, status: JobStatus) {
        let mut responses = self.responses.lock().unwrap();
        let queue = responses.entry(job_id.to_string()).or_default();
        queue.clear();
        queue.push_back(Ok(job(job_id, status)));
    }

    pub fn calls(&self, job_id: &str) -> usize {
        self.calls.lock().unwrap().get(job_id).copied().unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl JobService for ScriptedService {
    async fn enqueue(&self, request: &JobRequest) -> Result<EnqueueResponse, FetchError> {
        Ok(EnqueueResponse {
            job_id: format!("job-for-{}", request.user_id),
            status: JobStatus::Pending,
        })
    }

    async fn get_job(&self, job_id: &str) -> Result<Job, FetchError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(job_id.to_string())
            .or_default() += 1;
        let mut responses = self.responses.lock().unwrap();
        let queue = responses
            .get_mut(job_id)
            .ok_or_else(|| FetchError {
                kind: FailureKind::HttpStatus(404),
                message: "Job not found".to_string(),
            })?;
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }

    async fn get_user_jobs(&self, _owner_id: &str, _limit: usize) -> Result<Vec<Job>, FetchError> {
        Ok(Vec::new())
    }
}

/// Server side of one in-memory connection.
pub struct ServerEnd {
    pub observer_id: String,
    pub from_client: mpsc::UnboundedReceiver<String>,
    pub to_client: mpsc::UnboundedSender<Result<String, TransportError>>,
}

impl ServerEnd {
    pub async fn next_json(&mut self) -> serde_json::Value {
        let text = self.from_client.recv().await.expect("client frame");
        serde_json::from_str(&text).expect("client sent json")
    }

    pub fn push(&self, text: &str) {
        let _ = self.to_client.send(Ok(text.to_string()));
    }
}

/// Connector double. Accepted connections are handed to the test through
/// `accepted`; the first `fail_next` attempts are refused.
pub struct MemoryConnector {
    accepted: mpsc::UnboundedSender<ServerEnd>,
    fail_next: AtomicUsize,
    attempts: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerEnd>) {
        let (accepted, accepted_rx) = mpsc::unbounded_channel();
        (
            Self {
                accepted,
                fail_next: AtomicUsize::new(0),
                attempts: AtomicUsize::new(0),
            },
            accepted_rx,
        )
    }

    pub fn refuse_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, observer_id: &str) -> Result<Connection, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Connect("refused".to_string()));
        }

        let (client_tx, from_client) = mpsc::unbounded_channel::<String>();
        let (to_client, client_rx) = mpsc::unbounded_channel::<Result<String, TransportError>>();
        let _ = self.accepted.send(ServerEnd {
            observer_id: observer_id.to_string(),
            from_client,
            to_client,
        });

        let frame_sink = sink::unfold(client_tx, |tx, text: String| async move {
            tx.send(text)
                .map_err(|err| TransportError::Send(err.to_string()))?;
            Ok::<_, TransportError>(tx)
        });
        let frame_stream = stream::unfold(client_rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        });
        Ok(Connection::new(Box::pin(frame_sink), Box::pin(frame_stream)))
    }
}
