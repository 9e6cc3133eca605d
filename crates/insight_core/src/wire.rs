use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{JobId, JobStatus};

/// Messages sent over the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    Subscribe { job_id: JobId },
    Unsubscribe { job_id: JobId },
    Ping,
}

impl Outbound {
    pub fn encode(&self) -> String {
        // Plain enum of strings; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Typed events delivered to channel listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Subscribed { job_id: Option<JobId> },
    Unsubscribed { job_id: Option<JobId> },
    JobUpdate { job_id: JobId, status: JobStatus },
    HeartbeatAck,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("malformed json: {0}")]
    Json(String),
    #[error("unknown message type {0:?}")]
    UnknownType(String),
    #[error("{kind} message missing {field}")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
    #[error("unknown status {0:?}")]
    UnknownStatus(String),
}

#[derive(Debug, Deserialize)]
struct RawInbound {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    job_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Parses one inbound text frame. Extra fields such as `timestamp` or `data`
/// are ignored.
pub fn parse_inbound(text: &str) -> Result<ChannelEvent, WireError> {
    let raw: RawInbound =
        serde_json::from_str(text).map_err(|err| WireError::Json(err.to_string()))?;

    match raw.kind.as_str() {
        "subscribed" => Ok(ChannelEvent::Subscribed { job_id: raw.job_id }),
        "unsubscribed" => Ok(ChannelEvent::Unsubscribed { job_id: raw.job_id }),
        "pong" => Ok(ChannelEvent::HeartbeatAck),
        "job_update" => {
            let job_id = raw.job_id.ok_or(WireError::MissingField {
                kind: "job_update",
                field: "job_id",
            })?;
            let status = raw.status.ok_or(WireError::MissingField {
                kind: "job_update",
                field: "status",
            })?;
            let status = status
                .parse::<JobStatus>()
                .map_err(|err| WireError::UnknownStatus(err.0))?;
            Ok(ChannelEvent::JobUpdate { job_id, status })
        }
        other => Err(WireError::UnknownType(other.to_string())),
    }
}
