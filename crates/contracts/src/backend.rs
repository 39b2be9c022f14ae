//! Backend trait - queue + database interface consumed by the sender
//!
//! The backend owns message storage, the outbound queue and the
//! dedup/loop predicates. Implementations must be safe to share between
//! the scheduler and every worker.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    BackendError, ChannelLog, ChannelRef, MsgId, MsgStatus, MsgStatusValue, MsgUuid, OutgoingMsg,
};

/// Event type for a message created by a flow run
pub const EVENT_MSG_CREATED: &str = "msg_created";

/// One entry of a contact's run event history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_uuid: Option<MsgUuid>,
    pub created_on: DateTime<Utc>,
}

impl RunEvent {
    /// `msg_created` event for the given message
    pub fn msg_created(msg_uuid: MsgUuid, created_on: DateTime<Utc>) -> Self {
        Self {
            event_type: EVENT_MSG_CREATED.to_string(),
            msg_uuid: Some(msg_uuid),
            created_on,
        }
    }

    pub fn is_msg_created(&self) -> bool {
        self.event_type == EVENT_MSG_CREATED && self.msg_uuid.is_some()
    }
}

/// Stored view of a message as returned by [`Backend::get_message`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRecord {
    pub id: MsgId,
    pub uuid: MsgUuid,
    pub status: MsgStatusValue,
}

/// Result alias for backend calls
pub type BackendResult<T> = Result<T, BackendError>;

/// Queue and persistence contract
#[async_trait]
pub trait Backend: Send + Sync {
    /// Pop the next queued outbound message, waiting at most `timeout`
    ///
    /// Returns `Ok(None)` when nothing is queued.
    async fn pop_next_outgoing_msg(&self, timeout: Duration) -> BackendResult<Option<OutgoingMsg>>;

    /// Whether a sent marker exists for this message
    async fn was_msg_sent(&self, id: MsgId) -> BackendResult<bool>;

    /// Whether the message is caught in an automation loop
    async fn is_msg_loop(&self, msg: &OutgoingMsg) -> BackendResult<bool>;

    /// Remove the sent marker so a resend is not treated as a duplicate
    async fn clear_msg_sent(&self, id: MsgId) -> BackendResult<()>;

    /// Build a status value for a message of this channel
    fn new_msg_status_for_id(
        &self,
        channel: &ChannelRef,
        id: MsgId,
        status: MsgStatusValue,
    ) -> MsgStatus;

    async fn write_msg_status(&self, status: &MsgStatus) -> BackendResult<()>;

    async fn write_channel_logs(&self, logs: &[ChannelLog]) -> BackendResult<()>;

    /// Release the message from the queue and record the sent marker
    async fn mark_outgoing_msg_complete(
        &self,
        msg: &OutgoingMsg,
        status: &MsgStatus,
    ) -> BackendResult<()>;

    /// Run events of the contact owning this message, oldest first
    async fn get_run_events_by_msg_uuid(&self, uuid: MsgUuid) -> BackendResult<Vec<RunEvent>>;

    async fn get_message(&self, uuid: MsgUuid) -> BackendResult<Option<MsgRecord>>;

    async fn write_contact_last_seen(
        &self,
        msg: &OutgoingMsg,
        last_seen_on: DateTime<Utc>,
    ) -> BackendResult<()>;
}
