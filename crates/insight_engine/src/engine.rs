//! Coordinator runtime: owns the sync state and interprets its effects.

use std::sync::Arc;

use insight_core::{
    update, ChannelEvent, ChannelState, Effect, FetchOrigin, Job, JobId, JobStatus, Msg, SyncState,
};
use insight_logging::{insight_debug, insight_info, insight_warn};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::poller::{PollFetch, PollingEngine};
use crate::push::{ChannelEventSink, ChannelSettings, PushChannel};
use crate::service::{is_plausible_job_id, JobService};
use crate::transport::Connector;
use crate::{ClientSettings, FetchError};

/// Notified synchronously, in order, for every accepted job snapshot.
pub trait JobObserver: Send + Sync {
    fn on_job_changed(&self, job_id: &JobId, job: &Job);

    /// A fetch for a watched job failed. Polling continues.
    fn on_fetch_error(&self, _job_id: &JobId, _error: &FetchError) {}
}

enum EngineEvent {
    AddObserver(Arc<dyn JobObserver>),
    SetIdentity(Option<String>),
    Watch(JobId),
    Unwatch(JobId),
    Refresh(JobId),
    Snapshot(JobId, oneshot::Sender<Option<Job>>),
    Channel(ChannelEvent),
    FetchDone {
        job_id: JobId,
        origin: FetchOrigin,
        result: Result<Job, FetchError>,
    },
    Shutdown,
}

/// Handle to the job synchronization runtime.
///
/// All state lives on one task; this handle only enqueues requests, so it can
/// be shared across views.
pub struct SyncEngine {
    tx: mpsc::UnboundedSender<EngineEvent>,
    channel_state: watch::Receiver<ChannelState>,
    task: JoinHandle<()>,
}

impl SyncEngine {
    /// Spawns the runtime and its push channel on the current tokio runtime.
    pub fn spawn(
        settings: ClientSettings,
        service: Arc<dyn JobService>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let channel = PushChannel::spawn(
            connector,
            ChannelSettings::from(&settings),
            Arc::new(RuntimeSink { tx: tx.clone() }),
        );
        let channel_state = channel.state_receiver();

        let runtime = Runtime {
            state: SyncState::new(),
            observers: Vec::new(),
            identity: None,
            channel_wanted: false,
            channel,
            poller: PollingEngine::new(settings.poll_interval),
            service,
            tx: tx.clone(),
        };
        let task = tokio::spawn(runtime.run(rx));

        Self {
            tx,
            channel_state,
            task,
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn JobObserver>) {
        self.send(EngineEvent::AddObserver(observer));
    }

    /// Sets the identity the push channel connects as. `None` or an empty id
    /// closes the channel; watched jobs keep polling.
    pub fn set_identity(&self, identity: Option<String>) {
        self.send(EngineEvent::SetIdentity(identity));
    }

    pub fn watch(&self, job_id: impl Into<JobId>) {
        self.send(EngineEvent::Watch(job_id.into()));
    }

    pub fn unwatch(&self, job_id: impl Into<JobId>) {
        self.send(EngineEvent::Unwatch(job_id.into()));
    }

    pub fn refresh(&self, job_id: impl Into<JobId>) {
        self.send(EngineEvent::Refresh(job_id.into()));
    }

    /// Latest accepted snapshot of a watched job.
    pub async fn job(&self, job_id: impl Into<JobId>) -> Option<Job> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineEvent::Snapshot(job_id.into(), reply_tx));
        reply_rx.await.ok().flatten()
    }

    pub fn channel_state(&self) -> watch::Receiver<ChannelState> {
        self.channel_state.clone()
    }

    /// Stops polling, closes the push channel and waits for the runtime.
    pub async fn shutdown(self) {
        self.send(EngineEvent::Shutdown);
        let _ = self.task.await;
    }

    fn send(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

struct RuntimeSink {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelEventSink for RuntimeSink {
    fn emit(&self, event: ChannelEvent) {
        let _ = self.tx.send(EngineEvent::Channel(event));
    }
}

/// Poll-path fetch: reports the result to the runtime and hands the status
/// back to the poll loop.
struct RuntimeFetch {
    service: Arc<dyn JobService>,
    tx: mpsc::UnboundedSender<EngineEvent>,
}

#[async_trait::async_trait]
impl PollFetch for RuntimeFetch {
    async fn fetch_status(&self, job_id: &str) -> Option<JobStatus> {
        let result = self.service.get_job(job_id).await;
        let status = result.as_ref().ok().map(|job| job.status);
        let _ = self.tx.send(EngineEvent::FetchDone {
            job_id: job_id.to_string(),
            origin: FetchOrigin::Poll,
            result,
        });
        status
    }
}

struct Runtime {
    state: SyncState,
    observers: Vec<Arc<dyn JobObserver>>,
    identity: Option<String>,
    channel_wanted: bool,
    channel: PushChannel,
    poller: PollingEngine,
    service: Arc<dyn JobService>,
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl Runtime {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<EngineEvent>) {
        while let Some(event) = rx.recv().await {
            match event {
                EngineEvent::AddObserver(observer) => self.observers.push(observer),
                EngineEvent::SetIdentity(identity) => self.set_identity(identity),
                EngineEvent::Watch(job_id) => {
                    if is_plausible_job_id(&job_id) {
                        self.dispatch(Msg::Watch { job_id });
                    }
                }
                EngineEvent::Unwatch(job_id) => {
                    self.dispatch(Msg::Unwatch { job_id });
                }
                EngineEvent::Refresh(job_id) => {
                    self.dispatch(Msg::Refresh { job_id });
                }
                EngineEvent::Snapshot(job_id, reply) => {
                    let _ = reply.send(self.state.job(&job_id).cloned());
                }
                EngineEvent::Channel(event) => self.on_channel_event(event),
                EngineEvent::FetchDone {
                    job_id,
                    origin,
                    result,
                } => self.on_fetch_done(job_id, origin, result),
                EngineEvent::Shutdown => break,
            }
        }

        self.poller.stop_all();
        self.channel.shutdown().await;
        insight_info!("Sync engine stopped");
    }

    fn set_identity(&mut self, identity: Option<String>) {
        self.identity = identity.filter(|id| !id.trim().is_empty());
        if !self.channel_wanted {
            return;
        }
        match &self.identity {
            Some(id) => self.channel.open(id.clone()),
            None => self.channel.close(),
        }
    }

    fn on_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::JobUpdate { job_id, status } => {
                insight_debug!("Push update for {job_id}: {status}");
                self.dispatch(Msg::PushUpdate { job_id, status });
            }
            other => insight_debug!("Push channel event {other:?}"),
        }
    }

    fn on_fetch_done(&mut self, job_id: JobId, origin: FetchOrigin, result: Result<Job, FetchError>) {
        match result {
            Ok(mut job) => {
                if job.job_id != job_id {
                    insight_warn!(
                        "Fetched record for {job_id} carries id {}; using the requested id",
                        job.job_id
                    );
                    job.job_id = job_id;
                }
                let previous = self.state.status(&job.job_id);
                let next = job.status;
                let id = job.job_id.clone();
                let accepted = self.dispatch(Msg::Fetched { job, origin });
                if accepted {
                    insight_debug!("Job {id}: {previous:?} -> {next} ({origin:?})");
                } else {
                    insight_debug!("Job {id}: ignored {next} after {previous:?} ({origin:?})");
                }
            }
            Err(error) => {
                insight_warn!("Fetching job {job_id} failed ({origin:?}): {error}");
                self.dispatch(Msg::FetchFailed {
                    job_id,
                    origin,
                    kind: error.kind,
                    message: error.message,
                });
            }
        }
    }

    /// Runs one update and executes its effects. Returns whether a snapshot
    /// was accepted.
    fn dispatch(&mut self, msg: Msg) -> bool {
        let (state, effects) = update(std::mem::take(&mut self.state), msg);
        self.state = state;

        let mut accepted = false;
        for effect in effects {
            accepted |= matches!(effect, Effect::JobChanged { .. });
            self.execute(effect);
        }
        accepted
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::AcquireChannel => {
                self.channel_wanted = true;
                if let Some(id) = &self.identity {
                    self.channel.open(id.clone());
                }
            }
            Effect::ReleaseChannel => {
                self.channel_wanted = false;
                self.channel.close();
            }
            Effect::Subscribe { job_id } => self.channel.subscribe(job_id),
            Effect::Unsubscribe { job_id } => self.channel.unsubscribe(job_id),
            Effect::FetchJob { job_id, origin } => {
                let service = self.service.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = service.get_job(&job_id).await;
                    let _ = tx.send(EngineEvent::FetchDone {
                        job_id,
                        origin,
                        result,
                    });
                });
            }
            Effect::StartPolling { job_id } => {
                let fetch = Arc::new(RuntimeFetch {
                    service: self.service.clone(),
                    tx: self.tx.clone(),
                });
                self.poller.start(job_id, fetch);
            }
            Effect::StopPolling { job_id } => self.poller.stop(&job_id),
            Effect::JobChanged { job } => {
                self.poller.observe(&job.job_id, job.status);
                for observer in &self.observers {
                    observer.on_job_changed(&job.job_id, &job);
                }
            }
            Effect::FetchFailed {
                job_id,
                kind,
                message,
            } => {
                let error = FetchError::new(kind, message);
                for observer in &self.observers {
                    observer.on_fetch_error(&job_id, &error);
                }
            }
        }
    }
}
