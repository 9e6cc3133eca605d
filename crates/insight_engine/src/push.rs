//! Push channel driver.
//!
//! Runs the `insight_core` channel machine on a task and executes its
//! effects: connect attempts, heartbeat and reconnect timers, and frame I/O.
//! Every connect attempt gets a generation number so that results of
//! superseded attempts are discarded.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use insight_core::{update_channel, ChannelEffect, ChannelEvent, ChannelMachine, ChannelMsg, ChannelState, JobId};
use insight_logging::{insight_debug, insight_info, insight_warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};

use crate::transport::{Connection, Connector, FrameSink, FrameStream};
use crate::{ClientSettings, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSettings {
    pub heartbeat_interval: Duration,
    pub reconnect_delay: Duration,
}

impl From<&ClientSettings> for ChannelSettings {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            heartbeat_interval: settings.heartbeat_interval,
            reconnect_delay: settings.reconnect_delay,
        }
    }
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self::from(&ClientSettings::default())
    }
}

/// Receives parsed inbound events.
pub trait ChannelEventSink: Send + Sync {
    fn emit(&self, event: ChannelEvent);
}

pub struct ChannelEventSender {
    tx: mpsc::UnboundedSender<ChannelEvent>,
}

impl ChannelEventSender {
    pub fn new(tx: mpsc::UnboundedSender<ChannelEvent>) -> Self {
        Self { tx }
    }
}

impl ChannelEventSink for ChannelEventSender {
    fn emit(&self, event: ChannelEvent) {
        let _ = self.tx.send(event);
    }
}

enum ChannelCommand {
    Apply(ChannelMsg),
    Shutdown,
}

enum AttemptResult {
    Opened {
        generation: u64,
        connection: Connection,
    },
    Failed {
        generation: u64,
        error: TransportError,
    },
}

/// Handle to the process-wide push channel. Registry and connection state
/// live on the driver task; this handle only sends requests and reads the
/// published state.
pub struct PushChannel {
    cmd_tx: mpsc::UnboundedSender<ChannelCommand>,
    state_rx: watch::Receiver<ChannelState>,
    task: JoinHandle<()>,
}

impl PushChannel {
    /// Spawns the driver on the current tokio runtime.
    pub fn spawn(
        connector: Arc<dyn Connector>,
        settings: ChannelSettings,
        sink: Arc<dyn ChannelEventSink>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ChannelState::Disconnected);
        let (attempt_tx, attempt_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            machine: ChannelMachine::new(),
            settings,
            connector,
            sink,
            state_tx,
            attempt_tx,
            generation: 0,
            attempt: None,
            sink_half: None,
            stream_half: None,
            heartbeat: None,
            reconnect: None,
        };
        let task = tokio::spawn(driver.run(cmd_rx, attempt_rx));

        Self {
            cmd_tx,
            state_rx,
            task,
        }
    }

    /// Sets the observer identity and connects. An empty id tears down.
    pub fn open(&self, observer_id: impl Into<String>) {
        self.apply(ChannelMsg::SetObserver(Some(observer_id.into())));
    }

    /// Clears the identity: cancels any pending reconnect and closes the
    /// transport. Subscriptions stay registered.
    pub fn close(&self) {
        self.apply(ChannelMsg::SetObserver(None));
    }

    pub fn subscribe(&self, job_id: impl Into<JobId>) {
        self.apply(ChannelMsg::Subscribe(job_id.into()));
    }

    pub fn unsubscribe(&self, job_id: impl Into<JobId>) {
        self.apply(ChannelMsg::Unsubscribe(job_id.into()));
    }

    pub fn state(&self) -> ChannelState {
        *self.state_rx.borrow()
    }

    pub fn state_receiver(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }

    /// Closes the transport and stops the driver task.
    pub async fn shutdown(self) {
        let _ = self.cmd_tx.send(ChannelCommand::Shutdown);
        let _ = self.task.await;
    }

    fn apply(&self, msg: ChannelMsg) {
        let _ = self.cmd_tx.send(ChannelCommand::Apply(msg));
    }
}

struct Driver {
    machine: ChannelMachine,
    settings: ChannelSettings,
    connector: Arc<dyn Connector>,
    sink: Arc<dyn ChannelEventSink>,
    state_tx: watch::Sender<ChannelState>,
    attempt_tx: mpsc::UnboundedSender<AttemptResult>,
    generation: u64,
    attempt: Option<JoinHandle<()>>,
    sink_half: Option<FrameSink>,
    stream_half: Option<FrameStream>,
    heartbeat: Option<Interval>,
    reconnect: Option<std::pin::Pin<Box<Sleep>>>,
}

impl Driver {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<ChannelCommand>,
        mut attempt_rx: mpsc::UnboundedReceiver<AttemptResult>,
    ) {
        loop {
            let msg = tokio::select! {
                command = cmd_rx.recv() => match command {
                    Some(ChannelCommand::Apply(msg)) => Some(msg),
                    Some(ChannelCommand::Shutdown) | None => break,
                },
                Some(result) = attempt_rx.recv() => self.on_attempt(result),
                frame = next_frame(&mut self.stream_half), if self.stream_half.is_some() => {
                    match frame {
                        Some(Ok(text)) => Some(ChannelMsg::Inbound(text)),
                        Some(Err(err)) => {
                            self.drop_connection();
                            Some(ChannelMsg::TransportClosed { reason: err.to_string() })
                        }
                        None => {
                            self.drop_connection();
                            Some(ChannelMsg::TransportClosed { reason: "closed by peer".to_string() })
                        }
                    }
                },
                _ = tick(&mut self.heartbeat), if self.heartbeat.is_some() => Some(ChannelMsg::HeartbeatDue),
                _ = sleep(&mut self.reconnect), if self.reconnect.is_some() => {
                    self.reconnect = None;
                    Some(ChannelMsg::ReconnectDue)
                },
            };
            if let Some(msg) = msg {
                self.apply(msg).await;
            }
        }

        self.apply(ChannelMsg::SetObserver(None)).await;
        insight_debug!("Push channel driver stopped");
    }

    fn on_attempt(&mut self, result: AttemptResult) -> Option<ChannelMsg> {
        match result {
            AttemptResult::Opened {
                generation,
                connection,
            } if generation == self.generation => {
                self.attempt = None;
                self.sink_half = Some(connection.sink);
                self.stream_half = Some(connection.stream);
                Some(ChannelMsg::TransportOpened)
            }
            AttemptResult::Failed { generation, error } if generation == self.generation => {
                self.attempt = None;
                Some(ChannelMsg::TransportClosed {
                    reason: error.to_string(),
                })
            }
            _ => {
                insight_debug!("Discarding result of superseded connect attempt");
                None
            }
        }
    }

    async fn apply(&mut self, msg: ChannelMsg) {
        let mut queue = VecDeque::from([msg]);
        while let Some(msg) = queue.pop_front() {
            let before = self.machine.state();
            let (machine, effects) = update_channel(std::mem::take(&mut self.machine), msg);
            self.machine = machine;
            for effect in effects {
                if let Some(follow_up) = self.execute(effect).await {
                    queue.push_back(follow_up);
                }
            }

            let after = self.machine.state();
            if before != after {
                insight_info!("Push channel {before:?} -> {after:?}");
                self.state_tx.send_replace(after);
            }
        }
    }

    async fn execute(&mut self, effect: ChannelEffect) -> Option<ChannelMsg> {
        match effect {
            ChannelEffect::Connect { observer_id } => {
                self.start_attempt(observer_id);
                None
            }
            ChannelEffect::CloseTransport => {
                self.generation += 1;
                if let Some(attempt) = self.attempt.take() {
                    attempt.abort();
                }
                if let Some(mut sink) = self.sink_half.take() {
                    let _ = sink.close().await;
                }
                self.stream_half = None;
                None
            }
            ChannelEffect::Send(message) => {
                let sink = self.sink_half.as_mut()?;
                match sink.send(message.encode()).await {
                    Ok(()) => None,
                    Err(err) => {
                        self.drop_connection();
                        Some(ChannelMsg::TransportClosed {
                            reason: err.to_string(),
                        })
                    }
                }
            }
            ChannelEffect::StartHeartbeat => {
                let period = self.settings.heartbeat_interval;
                let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
                heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.heartbeat = Some(heartbeat);
                None
            }
            ChannelEffect::StopHeartbeat => {
                self.heartbeat = None;
                None
            }
            ChannelEffect::ScheduleReconnect => {
                insight_info!(
                    "Push channel reconnecting in {:?}",
                    self.settings.reconnect_delay
                );
                self.reconnect = Some(Box::pin(tokio::time::sleep(self.settings.reconnect_delay)));
                None
            }
            ChannelEffect::CancelReconnect => {
                self.reconnect = None;
                None
            }
            ChannelEffect::Emit(event) => {
                self.sink.emit(event);
                None
            }
            ChannelEffect::Dropped { error } => {
                insight_warn!("Dropping malformed push message: {error}");
                None
            }
        }
    }

    fn start_attempt(&mut self, observer_id: String) {
        self.generation += 1;
        if let Some(previous) = self.attempt.take() {
            previous.abort();
        }

        let generation = self.generation;
        let connector = self.connector.clone();
        let attempt_tx = self.attempt_tx.clone();
        self.attempt = Some(tokio::spawn(async move {
            let result = match connector.connect(&observer_id).await {
                Ok(connection) => AttemptResult::Opened {
                    generation,
                    connection,
                },
                Err(error) => AttemptResult::Failed { generation, error },
            };
            let _ = attempt_tx.send(result);
        }));
    }

    fn drop_connection(&mut self) {
        self.generation += 1;
        self.sink_half = None;
        self.stream_half = None;
    }
}

async fn next_frame(stream: &mut Option<FrameStream>) -> Option<Result<String, TransportError>> {
    match stream {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(heartbeat) => {
            heartbeat.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn sleep(reconnect: &mut Option<std::pin::Pin<Box<Sleep>>>) {
    match reconnect {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
