//! Push channel state machine.
//!
//! The machine owns the connection state and the subscription registry. It
//! performs no I/O: the engine's channel driver feeds it transport and timer
//! messages and executes the effects it returns.

use crate::wire::{parse_inbound, ChannelEvent, Outbound, WireError};
use crate::{JobId, SubscriptionRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelMsg {
    /// Observer identity set (open) or cleared (teardown). Empty ids clear.
    SetObserver(Option<String>),
    /// The pending connect attempt succeeded.
    TransportOpened,
    /// The transport closed, errored, or the connect attempt failed.
    TransportClosed { reason: String },
    /// The scheduled reconnect delay elapsed.
    ReconnectDue,
    /// The heartbeat interval elapsed.
    HeartbeatDue,
    Subscribe(JobId),
    Unsubscribe(JobId),
    /// Raw inbound text frame.
    Inbound(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEffect {
    Connect { observer_id: String },
    CloseTransport,
    Send(Outbound),
    StartHeartbeat,
    StopHeartbeat,
    ScheduleReconnect,
    CancelReconnect,
    Emit(ChannelEvent),
    /// Inbound frame that did not parse; dropped after logging.
    Dropped { error: WireError },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelMachine {
    state: ChannelState,
    observer: Option<String>,
    registry: SubscriptionRegistry,
    reconnect_pending: bool,
}

impl ChannelMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn observer(&self) -> Option<&str> {
        self.observer.as_deref()
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    fn begin_connect(&mut self, observer_id: String, effects: &mut Vec<ChannelEffect>) {
        self.state = ChannelState::Connecting;
        effects.push(ChannelEffect::Connect { observer_id });
    }

    fn teardown(&mut self, effects: &mut Vec<ChannelEffect>) {
        if self.reconnect_pending {
            self.reconnect_pending = false;
            effects.push(ChannelEffect::CancelReconnect);
        }
        if self.state == ChannelState::Connected {
            effects.push(ChannelEffect::StopHeartbeat);
        }
        if self.state != ChannelState::Disconnected {
            effects.push(ChannelEffect::CloseTransport);
        }
        self.state = ChannelState::Disconnected;
    }
}

/// Pure update function for the push channel.
pub fn update_channel(
    mut machine: ChannelMachine,
    msg: ChannelMsg,
) -> (ChannelMachine, Vec<ChannelEffect>) {
    let mut effects = Vec::new();

    match msg {
        ChannelMsg::SetObserver(observer) => {
            let observer = observer.filter(|id| !id.trim().is_empty());
            match observer {
                None => {
                    machine.observer = None;
                    machine.teardown(&mut effects);
                }
                Some(id) => {
                    let unchanged = machine.observer.as_deref() == Some(id.as_str());
                    if unchanged && machine.state != ChannelState::Disconnected {
                        return (machine, effects);
                    }
                    machine.teardown(&mut effects);
                    machine.observer = Some(id.clone());
                    machine.begin_connect(id, &mut effects);
                }
            }
        }
        ChannelMsg::TransportOpened => {
            if machine.state == ChannelState::Connecting {
                machine.state = ChannelState::Connected;
                effects.push(ChannelEffect::StartHeartbeat);
                effects.extend(machine.registry.job_ids().map(|job_id| {
                    ChannelEffect::Send(Outbound::Subscribe {
                        job_id: job_id.clone(),
                    })
                }));
            }
        }
        ChannelMsg::TransportClosed { .. } => {
            if machine.state != ChannelState::Disconnected {
                if machine.state == ChannelState::Connected {
                    effects.push(ChannelEffect::StopHeartbeat);
                }
                machine.state = ChannelState::Disconnected;
                if machine.observer.is_some() && !machine.reconnect_pending {
                    machine.reconnect_pending = true;
                    effects.push(ChannelEffect::ScheduleReconnect);
                }
            }
        }
        ChannelMsg::ReconnectDue => {
            if machine.reconnect_pending {
                machine.reconnect_pending = false;
                if machine.state == ChannelState::Disconnected {
                    if let Some(id) = machine.observer.clone() {
                        machine.begin_connect(id, &mut effects);
                    }
                }
            }
        }
        ChannelMsg::HeartbeatDue => {
            if machine.state == ChannelState::Connected {
                effects.push(ChannelEffect::Send(Outbound::Ping));
            }
        }
        ChannelMsg::Subscribe(job_id) => {
            if machine.registry.acquire(&job_id) && machine.state == ChannelState::Connected {
                effects.push(ChannelEffect::Send(Outbound::Subscribe { job_id }));
            }
        }
        ChannelMsg::Unsubscribe(job_id) => {
            if machine.registry.release(&job_id) && machine.state == ChannelState::Connected {
                effects.push(ChannelEffect::Send(Outbound::Unsubscribe { job_id }));
            }
        }
        ChannelMsg::Inbound(text) => match parse_inbound(&text) {
            Ok(event) => effects.push(ChannelEffect::Emit(event)),
            Err(error) => effects.push(ChannelEffect::Dropped { error }),
        },
    }

    (machine, effects)
}
