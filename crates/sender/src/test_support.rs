//! Fixtures shared by the unit tests

use std::sync::Mutex;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use contracts::{ActionType, ChannelRef, ContactRef, MsgId, MsgPriority, OutgoingMsg};
use publisher::{EventPublisher, PublishRequest};

/// Plain text message on a channel of the given type
pub(crate) fn message(id: i64, channel_type: &str) -> OutgoingMsg {
    OutgoingMsg {
        id: MsgId(id),
        uuid: Uuid::new_v4(),
        channel: ChannelRef {
            uuid: Uuid::new_v4(),
            channel_type: channel_type.into(),
            name: format!("{channel_type} channel"),
            address: "+15550001111".to_string(),
        },
        contact: ContactRef {
            uuid: Uuid::new_v4(),
            name: "Ana".to_string(),
        },
        urn: "whatsapp:15551234567".to_string(),
        text: format!("message {id}"),
        attachments: Vec::new(),
        quick_replies: Vec::new(),
        metadata: Value::Null,
        action: ActionType::None,
        is_resend: false,
        priority: MsgPriority::Default,
        created_on: Utc::now(),
    }
}

/// Publisher keeping every request in memory
#[derive(Default)]
pub(crate) struct RecordingPublisher {
    requests: Mutex<Vec<PublishRequest>>,
}

impl RecordingPublisher {
    pub(crate) fn requests(&self) -> Vec<PublishRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn routing_keys(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.routing_key).collect()
    }

    pub(crate) fn payloads(&self) -> Vec<Value> {
        self.requests()
            .iter()
            .map(|r| serde_json::from_slice(&r.payload).unwrap())
            .collect()
    }
}

impl EventPublisher for RecordingPublisher {
    fn name(&self) -> &str {
        "recording"
    }

    fn send_async(&self, request: PublishRequest) {
        self.requests.lock().unwrap().push(request);
    }
}
