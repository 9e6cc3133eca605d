//! Insight core: job model and pure state machines for job synchronization.
mod channel;
mod effect;
mod job;
mod msg;
mod registry;
mod state;
mod update;
mod view_model;
mod wire;

pub use channel::{update_channel, ChannelEffect, ChannelMachine, ChannelMsg, ChannelState};
pub use effect::Effect;
pub use job::{
    accepts_transition, Job, JobId, JobKind, JobResults, JobStatus, LintIssue, LintResult,
    TokenUsage, UnknownStatus,
};
pub use msg::{FailureKind, FetchOrigin, Msg};
pub use registry::SubscriptionRegistry;
pub use state::SyncState;
pub use update::update;
pub use view_model::{JobRowView, JobStats};
pub use wire::{parse_inbound, ChannelEvent, Outbound, WireError};
