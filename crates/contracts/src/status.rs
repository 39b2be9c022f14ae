//! MsgStatus - Worker output, persisted by the backend

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ChannelLog, ChannelUuid, MsgId};

/// Lifecycle state of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MsgStatusValue {
    #[default]
    Pending,
    Queued,
    /// Handed to the vendor, no confirmation yet
    Wired,
    Sent,
    Delivered,
    Read,
    /// Retryable failure
    Errored,
    /// Permanent failure
    Failed,
}

impl MsgStatusValue {
    /// `errored` or `failed`
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Errored | Self::Failed)
    }

    /// `delivered` or `read`
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Delivered | Self::Read)
    }

    /// Label used in logs and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Wired => "wired",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
            Self::Errored => "errored",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for MsgStatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status update for one dispatch attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MsgStatus {
    pub msg_id: MsgId,
    pub channel_uuid: ChannelUuid,

    /// Id assigned by the vendor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    pub status: MsgStatusValue,

    #[serde(default)]
    pub logs: Vec<ChannelLog>,

    pub modified_on: DateTime<Utc>,
}

impl MsgStatus {
    /// Create a status without logs or external id
    pub fn new(channel_uuid: ChannelUuid, msg_id: MsgId, status: MsgStatusValue) -> Self {
        Self {
            msg_id,
            channel_uuid,
            external_id: None,
            status,
            logs: Vec::new(),
            modified_on: Utc::now(),
        }
    }

    /// Set the vendor id
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Attach channel logs
    pub fn add_logs(&mut self, logs: impl IntoIterator<Item = ChannelLog>) {
        self.logs.extend(logs);
    }
}
