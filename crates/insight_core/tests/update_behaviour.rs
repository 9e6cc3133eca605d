use std::sync::Once;

use insight_core::{update, Effect, FailureKind, FetchOrigin, Job, JobStatus, Msg, SyncState};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(insight_logging::initialize_for_tests);
}

fn watch(state: SyncState, job_id: &str) -> (SyncState, Vec<Effect>) {
    update(
        state,
        Msg::Watch {
            job_id: job_id.to_string(),
        },
    )
}

fn fetched(state: SyncState, job_id: &str, status: JobStatus) -> (SyncState, Vec<Effect>) {
    update(
        state,
        Msg::Fetched {
            job: Job::new(job_id, status),
            origin: FetchOrigin::Poll,
        },
    )
}

#[test]
fn first_watch_subscribes_fetches_and_polls() {
    init_logging();
    let (state, effects) = watch(SyncState::new(), "j1");

    assert_eq!(
        effects,
        vec![
            Effect::AcquireChannel,
            Effect::Subscribe {
                job_id: "j1".to_string()
            },
            Effect::FetchJob {
                job_id: "j1".to_string(),
                origin: FetchOrigin::Initial
            },
            Effect::StartPolling {
                job_id: "j1".to_string()
            },
        ]
    );
    assert_eq!(state.status("j1"), None);
    assert!(state.is_polling("j1"));
}

#[test]
fn second_observer_of_same_job_emits_nothing() {
    init_logging();
    let (state, _) = watch(SyncState::new(), "j1");
    let (state, effects) = watch(state, "j1");

    assert!(effects.is_empty());
    assert_eq!(state.observers("j1"), 2);
}

#[test]
fn second_job_reuses_the_channel() {
    init_logging();
    let (state, _) = watch(SyncState::new(), "j1");
    let (_state, effects) = watch(state, "j2");

    assert!(!effects.contains(&Effect::AcquireChannel));
    assert!(effects.contains(&Effect::Subscribe {
        job_id: "j2".to_string()
    }));
}

#[test]
fn statuses_only_move_forward() {
    init_logging();
    let (state, _) = watch(SyncState::new(), "j1");
    let (state, effects) = fetched(state, "j1", JobStatus::Processing);
    assert_eq!(effects.len(), 1);
    assert_eq!(state.status("j1"), Some(JobStatus::Processing));

    // Out-of-order delivery of an older snapshot.
    let (state, effects) = fetched(state, "j1", JobStatus::Pending);
    assert!(effects.is_empty());
    assert_eq!(state.status("j1"), Some(JobStatus::Processing));

    // Same status, newer payload: last write wins.
    let mut newer = Job::new("j1", JobStatus::Processing);
    newer.estimated_cost = 0.5;
    let (state, effects) = update(
        state,
        Msg::Fetched {
            job: newer.clone(),
            origin: FetchOrigin::Push,
        },
    );
    assert_eq!(effects, vec![Effect::JobChanged { job: newer.clone() }]);
    assert_eq!(state.job("j1").map(|job| job.estimated_cost), Some(0.5));

    // Re-reading the same record notifies nobody.
    let (_state, effects) = update(
        state,
        Msg::Fetched {
            job: newer,
            origin: FetchOrigin::Poll,
        },
    );
    assert!(effects.is_empty());
}

#[test]
fn terminal_snapshot_stops_polling_but_keeps_subscription() {
    init_logging();
    let (state, _) = watch(SyncState::new(), "j1");
    let (state, effects) = fetched(state, "j1", JobStatus::Completed);

    assert_eq!(
        effects,
        vec![
            Effect::JobChanged {
                job: Job::new("j1", JobStatus::Completed)
            },
            Effect::StopPolling {
                job_id: "j1".to_string()
            },
        ]
    );
    assert!(!state.is_polling("j1"));
    assert_eq!(state.observers("j1"), 1);
}

#[test]
fn events_after_terminal_are_noops() {
    init_logging();
    let (state, _) = watch(SyncState::new(), "j1");
    let (state, _) = fetched(state, "j1", JobStatus::Failed);

    let (state, effects) = fetched(state.clone(), "j1", JobStatus::Completed);
    assert!(effects.is_empty());
    assert_eq!(state.status("j1"), Some(JobStatus::Failed));

    let (state, effects) = update(
        state,
        Msg::PushUpdate {
            job_id: "j1".to_string(),
            status: JobStatus::Completed,
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.status("j1"), Some(JobStatus::Failed));
}

#[test]
fn push_update_triggers_refetch_unless_stale() {
    init_logging();
    let (state, _) = watch(SyncState::new(), "j1");
    let (state, _) = fetched(state, "j1", JobStatus::Processing);

    let (state, effects) = update(
        state,
        Msg::PushUpdate {
            job_id: "j1".to_string(),
            status: JobStatus::Completed,
        },
    );
    assert_eq!(
        effects,
        vec![Effect::FetchJob {
            job_id: "j1".to_string(),
            origin: FetchOrigin::Push
        }]
    );

    let (_state, effects) = update(
        state,
        Msg::PushUpdate {
            job_id: "j1".to_string(),
            status: JobStatus::Pending,
        },
    );
    assert!(effects.is_empty());
}

#[test]
fn unwatch_releases_only_for_last_observer() {
    init_logging();
    let (state, _) = watch(SyncState::new(), "j1");
    let (state, _) = watch(state, "j1");

    let (state, effects) = update(
        state,
        Msg::Unwatch {
            job_id: "j1".to_string(),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.observers("j1"), 1);

    let (state, effects) = update(
        state,
        Msg::Unwatch {
            job_id: "j1".to_string(),
        },
    );
    assert_eq!(
        effects,
        vec![
            Effect::StopPolling {
                job_id: "j1".to_string()
            },
            Effect::Unsubscribe {
                job_id: "j1".to_string()
            },
            Effect::ReleaseChannel,
        ]
    );
    assert!(!state.has_watches());
}

#[test]
fn unwatch_after_terminal_does_not_stop_polling_twice() {
    init_logging();
    let (state, _) = watch(SyncState::new(), "j1");
    let (state, _) = fetched(state, "j1", JobStatus::Completed);
    let (_state, effects) = update(
        state,
        Msg::Unwatch {
            job_id: "j1".to_string(),
        },
    );

    assert_eq!(
        effects,
        vec![
            Effect::Unsubscribe {
                job_id: "j1".to_string()
            },
            Effect::ReleaseChannel,
        ]
    );
}

#[test]
fn fetch_failure_is_reported_and_cleared_by_next_snapshot() {
    init_logging();
    let (state, _) = watch(SyncState::new(), "j1");
    let (state, effects) = update(
        state,
        Msg::FetchFailed {
            job_id: "j1".to_string(),
            origin: FetchOrigin::Poll,
            kind: FailureKind::HttpStatus(502),
            message: "http status 502".to_string(),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::FetchFailed {
            job_id: "j1".to_string(),
            kind: FailureKind::HttpStatus(502),
            message: "http status 502".to_string()
        }]
    );
    assert_eq!(state.last_error("j1"), Some("http status 502"));
    assert!(state.is_polling("j1"));

    let (state, _) = fetched(state, "j1", JobStatus::Processing);
    assert_eq!(state.last_error("j1"), None);
}

#[test]
fn fetch_failure_does_not_touch_other_jobs() {
    init_logging();
    let (state, _) = watch(SyncState::new(), "j1");
    let (state, _) = watch(state, "j2");
    let (state, _) = fetched(state, "j2", JobStatus::Processing);
    let (state, _) = update(
        state,
        Msg::FetchFailed {
            job_id: "j1".to_string(),
            origin: FetchOrigin::Manual,
            kind: FailureKind::Network,
            message: "network error".to_string(),
        },
    );

    assert_eq!(state.last_error("j2"), None);
    assert_eq!(state.status("j2"), Some(JobStatus::Processing));
}

#[test]
fn refresh_only_fetches_watched_jobs() {
    init_logging();
    let (state, effects) = update(
        SyncState::new(),
        Msg::Refresh {
            job_id: "j1".to_string(),
        },
    );
    assert!(effects.is_empty());

    let (state, _) = watch(state, "j1");
    let (_state, effects) = update(
        state,
        Msg::Refresh {
            job_id: "j1".to_string(),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::FetchJob {
            job_id: "j1".to_string(),
            origin: FetchOrigin::Manual
        }]
    );
}
