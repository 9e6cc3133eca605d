use std::sync::Once;

use insight_core::{
    update_channel, ChannelEffect, ChannelEvent, ChannelMachine, ChannelMsg, ChannelState,
    JobStatus, Outbound,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(insight_logging::initialize_for_tests);
}

fn apply(machine: ChannelMachine, msgs: Vec<ChannelMsg>) -> (ChannelMachine, Vec<ChannelEffect>) {
    let mut machine = machine;
    let mut all = Vec::new();
    for msg in msgs {
        let (next, effects) = update_channel(machine, msg);
        machine = next;
        all.extend(effects);
    }
    (machine, all)
}

fn connected(observer: &str) -> ChannelMachine {
    let (machine, _) = apply(
        ChannelMachine::new(),
        vec![
            ChannelMsg::SetObserver(Some(observer.to_string())),
            ChannelMsg::TransportOpened,
        ],
    );
    machine
}

fn sent(effects: &[ChannelEffect]) -> Vec<Outbound> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            ChannelEffect::Send(message) => Some(message.clone()),
            _ => None,
        })
        .collect()
}

fn subscribe(job_id: &str) -> ChannelMsg {
    ChannelMsg::Subscribe(job_id.to_string())
}

fn unsubscribe(job_id: &str) -> ChannelMsg {
    ChannelMsg::Unsubscribe(job_id.to_string())
}

#[test]
fn open_moves_through_connecting_to_connected() {
    init_logging();
    let (machine, effects) = update_channel(
        ChannelMachine::new(),
        ChannelMsg::SetObserver(Some("user-1".to_string())),
    );
    assert_eq!(machine.state(), ChannelState::Connecting);
    assert_eq!(
        effects,
        vec![ChannelEffect::Connect {
            observer_id: "user-1".to_string()
        }]
    );

    let (machine, effects) = update_channel(machine, ChannelMsg::TransportOpened);
    assert_eq!(machine.state(), ChannelState::Connected);
    assert_eq!(effects, vec![ChannelEffect::StartHeartbeat]);
}

#[test]
fn subscriptions_while_disconnected_are_replayed_on_connect() {
    init_logging();
    let (machine, effects) = apply(
        ChannelMachine::new(),
        vec![subscribe("a"), subscribe("b"), subscribe("a"), unsubscribe("b")],
    );
    assert!(sent(&effects).is_empty());
    assert_eq!(machine.registry().holders("a"), 2);

    let (machine, effects) = apply(
        machine,
        vec![
            ChannelMsg::SetObserver(Some("user-1".to_string())),
            ChannelMsg::TransportOpened,
        ],
    );
    assert_eq!(machine.state(), ChannelState::Connected);
    assert_eq!(
        sent(&effects),
        vec![Outbound::Subscribe {
            job_id: "a".to_string()
        }]
    );
}

#[test]
fn subscribe_is_sent_once_per_zero_to_one_transition() {
    init_logging();
    let (_machine, effects) = apply(
        connected("user-1"),
        vec![
            subscribe("a"),
            subscribe("a"),
            subscribe("a"),
            unsubscribe("a"),
            unsubscribe("a"),
            unsubscribe("a"),
            subscribe("a"),
        ],
    );

    assert_eq!(
        sent(&effects),
        vec![
            Outbound::Subscribe {
                job_id: "a".to_string()
            },
            Outbound::Unsubscribe {
                job_id: "a".to_string()
            },
            Outbound::Subscribe {
                job_id: "a".to_string()
            },
        ]
    );
}

#[test]
fn non_last_unsubscribe_sends_nothing() {
    init_logging();
    let (machine, _) = apply(connected("user-1"), vec![subscribe("a"), subscribe("a")]);
    let (machine, effects) = update_channel(machine, unsubscribe("a"));
    assert!(sent(&effects).is_empty());

    let (_machine, effects) = update_channel(machine, unsubscribe("a"));
    assert_eq!(
        sent(&effects),
        vec![Outbound::Unsubscribe {
            job_id: "a".to_string()
        }]
    );
}

#[test]
fn close_schedules_a_single_reconnect() {
    init_logging();
    let (machine, effects) = update_channel(
        connected("user-1"),
        ChannelMsg::TransportClosed {
            reason: "reset".to_string(),
        },
    );
    assert_eq!(machine.state(), ChannelState::Disconnected);
    assert_eq!(
        effects,
        vec![ChannelEffect::StopHeartbeat, ChannelEffect::ScheduleReconnect]
    );

    // A duplicate close for the same drop does not schedule again.
    let (machine, effects) = update_channel(
        machine,
        ChannelMsg::TransportClosed {
            reason: "error".to_string(),
        },
    );
    assert!(effects.is_empty());

    let (machine, effects) = update_channel(machine, ChannelMsg::ReconnectDue);
    assert_eq!(machine.state(), ChannelState::Connecting);
    assert_eq!(
        effects,
        vec![ChannelEffect::Connect {
            observer_id: "user-1".to_string()
        }]
    );
}

#[test]
fn failed_connect_keeps_retrying() {
    init_logging();
    let mut machine = ChannelMachine::new();
    let (next, _) = update_channel(machine, ChannelMsg::SetObserver(Some("u".to_string())));
    machine = next;

    for _ in 0..5 {
        let (next, effects) = update_channel(
            machine,
            ChannelMsg::TransportClosed {
                reason: "refused".to_string(),
            },
        );
        assert_eq!(effects, vec![ChannelEffect::ScheduleReconnect]);
        let (next, effects) = update_channel(next, ChannelMsg::ReconnectDue);
        assert_eq!(
            effects,
            vec![ChannelEffect::Connect {
                observer_id: "u".to_string()
            }]
        );
        machine = next;
    }
}

#[test]
fn clearing_identity_cancels_reconnect_and_closes() {
    init_logging();
    let (machine, _) = update_channel(
        connected("user-1"),
        ChannelMsg::TransportClosed {
            reason: "reset".to_string(),
        },
    );
    assert!(machine.reconnect_pending());

    let (machine, effects) = update_channel(machine, ChannelMsg::SetObserver(None));
    assert_eq!(effects, vec![ChannelEffect::CancelReconnect]);
    assert_eq!(machine.state(), ChannelState::Disconnected);

    let (machine, effects) = update_channel(machine, ChannelMsg::ReconnectDue);
    assert!(effects.is_empty());
    assert_eq!(machine.state(), ChannelState::Disconnected);
}

#[test]
fn empty_identity_tears_down_live_connection() {
    init_logging();
    let (machine, effects) = update_channel(
        connected("user-1"),
        ChannelMsg::SetObserver(Some("  ".to_string())),
    );
    assert_eq!(
        effects,
        vec![ChannelEffect::StopHeartbeat, ChannelEffect::CloseTransport]
    );
    assert_eq!(machine.observer(), None);

    // The transport's own close after teardown must not reconnect.
    let (_machine, effects) = update_channel(
        machine,
        ChannelMsg::TransportClosed {
            reason: "closed".to_string(),
        },
    );
    assert!(effects.is_empty());
}

#[test]
fn heartbeat_only_while_connected() {
    init_logging();
    let (_machine, effects) = update_channel(ChannelMachine::new(), ChannelMsg::HeartbeatDue);
    assert!(effects.is_empty());

    let (_machine, effects) = update_channel(connected("u"), ChannelMsg::HeartbeatDue);
    assert_eq!(effects, vec![ChannelEffect::Send(Outbound::Ping)]);
}

#[test]
fn inbound_frames_become_events_or_are_dropped() {
    init_logging();
    let machine = connected("u");
    let (machine, effects) = update_channel(
        machine,
        ChannelMsg::Inbound(r#"{"type":"job_update","job_id":"a","status":"completed"}"#.to_string()),
    );
    assert_eq!(
        effects,
        vec![ChannelEffect::Emit(ChannelEvent::JobUpdate {
            job_id: "a".to_string(),
            status: JobStatus::Completed
        })]
    );

    let (machine, effects) = update_channel(machine, ChannelMsg::Inbound("{oops".to_string()));
    assert!(matches!(effects.as_slice(), [ChannelEffect::Dropped { .. }]));
    assert_eq!(machine.state(), ChannelState::Connected);
}

#[test]
fn stale_open_after_teardown_is_ignored() {
    init_logging();
    let (machine, _) = apply(
        ChannelMachine::new(),
        vec![
            ChannelMsg::SetObserver(Some("u".to_string())),
            ChannelMsg::SetObserver(None),
        ],
    );
    let (machine, effects) = update_channel(machine, ChannelMsg::TransportOpened);
    assert!(effects.is_empty());
    assert_eq!(machine.state(), ChannelState::Disconnected);
}
