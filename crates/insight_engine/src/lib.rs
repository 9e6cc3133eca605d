//! Insight engine: job service client, push channel, polling and the sync
//! runtime that ties them to the `insight_core` state machines.
mod engine;
mod poll_client;
mod poller;
mod push;
mod request;
mod service;
mod settings;
mod transport;
mod types;

pub use engine::{JobObserver, SyncEngine};
pub use poll_client::{poll_until_complete, PollProgress};
pub use poller::{PollFetch, PollingEngine, MIN_POLL_INTERVAL};
pub use push::{ChannelEventSender, ChannelEventSink, ChannelSettings, PushChannel};
pub use request::{
    cursor_context, is_supported_language, language_for_path, EnqueueResponse, JobRequest,
    CURSOR_CONTEXT_RADIUS,
};
pub use service::{JobService, ReqwestJobService};
pub use settings::{ClientSettings, PollBudget};
pub use transport::{Connection, Connector, FrameSink, FrameStream, TungsteniteConnector};
pub use insight_core::FailureKind;
pub use types::{FetchError, PollError, TransportError};
