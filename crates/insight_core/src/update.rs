use crate::{accepts_transition, Effect, FetchOrigin, Msg, SyncState};

/// Pure update function: applies a message to state and returns any effects.
///
/// Push and poll are independent producers; the monotonic status guard in
/// [`accepts_transition`] arbitrates between them.
pub fn update(mut state: SyncState, msg: Msg) -> (SyncState, Vec<Effect>) {
    let effects = match msg {
        Msg::Watch { job_id } => {
            let first_job = !state.has_watches();
            let tracked = state.jobs.entry(job_id.clone()).or_default();
            tracked.observers += 1;
            if tracked.observers > 1 {
                return (state, Vec::new());
            }

            tracked.polling = true;
            let mut effects = Vec::with_capacity(4);
            if first_job {
                effects.push(Effect::AcquireChannel);
            }
            effects.push(Effect::Subscribe {
                job_id: job_id.clone(),
            });
            effects.push(Effect::FetchJob {
                job_id: job_id.clone(),
                origin: FetchOrigin::Initial,
            });
            effects.push(Effect::StartPolling { job_id });
            effects
        }
        Msg::Unwatch { job_id } => {
            let Some(tracked) = state.jobs.get_mut(&job_id) else {
                return (state, Vec::new());
            };
            tracked.observers -= 1;
            if tracked.observers > 0 {
                return (state, Vec::new());
            }

            let was_polling = tracked.polling;
            state.jobs.remove(&job_id);
            let mut effects = Vec::with_capacity(3);
            if was_polling {
                effects.push(Effect::StopPolling {
                    job_id: job_id.clone(),
                });
            }
            effects.push(Effect::Unsubscribe { job_id });
            if !state.has_watches() {
                effects.push(Effect::ReleaseChannel);
            }
            effects
        }
        Msg::Refresh { job_id } => {
            if state.jobs.contains_key(&job_id) {
                vec![Effect::FetchJob {
                    job_id,
                    origin: FetchOrigin::Manual,
                }]
            } else {
                Vec::new()
            }
        }
        Msg::PushUpdate { job_id, status } => match state.jobs.get(&job_id) {
            Some(tracked) if accepts_transition(tracked.status(), status) => {
                // The push frame only carries the status; re-read the full record.
                vec![Effect::FetchJob {
                    job_id,
                    origin: FetchOrigin::Push,
                }]
            }
            _ => Vec::new(),
        },
        Msg::Fetched { job, origin: _ } => {
            let Some(tracked) = state.jobs.get_mut(&job.job_id) else {
                return (state, Vec::new());
            };
            if !accepts_transition(tracked.status(), job.status) {
                return (state, Vec::new());
            }

            tracked.last_error = None;
            if tracked.snapshot.as_ref() == Some(&job) {
                // Unchanged record; observers already have it.
                return (state, Vec::new());
            }

            let job_id = job.job_id.clone();
            let terminal = job.is_terminal();
            tracked.snapshot = Some(job.clone());

            let mut effects = vec![Effect::JobChanged { job }];
            if terminal && tracked.polling {
                tracked.polling = false;
                effects.push(Effect::StopPolling { job_id });
            }
            effects
        }
        Msg::FetchFailed {
            job_id,
            origin: _,
            kind,
            message,
        } => match state.jobs.get_mut(&job_id) {
            Some(tracked) => {
                tracked.last_error = Some(message.clone());
                vec![Effect::FetchFailed {
                    job_id,
                    kind,
                    message,
                }]
            }
            None => Vec::new(),
        },
    };

    (state, effects)
}

