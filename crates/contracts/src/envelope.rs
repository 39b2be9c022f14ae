//! Side-channel envelopes - wire format published to billing/template consumers
//!
//! Field names are part of the external contract; do not rename.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ChannelType, ChannelUuid, MsgStatus, OutgoingMsg, Templating};

/// Message direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "I")]
    Incoming,
    #[serde(rename = "O")]
    Outgoing,
}

/// Billing / usage event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideChannelEnvelope {
    pub contact_uuid: Uuid,
    pub contact_name: String,
    pub channel_uuid: ChannelUuid,
    pub external_id: String,
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    pub channel_type: ChannelType,
    pub text: String,
    pub attachments: Vec<String>,
    pub quick_replies: Vec<String>,
}

impl SideChannelEnvelope {
    /// Envelope for a dispatched outgoing message
    pub fn outgoing(msg: &OutgoingMsg, status: &MsgStatus) -> Self {
        Self {
            contact_uuid: msg.contact.uuid,
            contact_name: msg.contact.name.clone(),
            channel_uuid: msg.channel.uuid,
            external_id: status.external_id.clone().unwrap_or_default(),
            timestamp: status.modified_on,
            direction: Direction::Outgoing,
            channel_type: msg.channel.channel_type.clone(),
            text: msg.text.clone(),
            attachments: msg.attachments.clone(),
            quick_replies: msg.quick_replies.clone(),
        }
    }
}

/// Template send event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateEnvelope {
    #[serde(flatten)]
    pub envelope: SideChannelEnvelope,
    pub template_name: String,
    pub template_uuid: String,
    pub template_language: String,
    pub template_namespace: String,
    pub template_variables: Vec<String>,
}

impl TemplateEnvelope {
    pub fn new(envelope: SideChannelEnvelope, templating: &Templating) -> Self {
        Self {
            envelope,
            template_name: templating.template.name.clone(),
            template_uuid: templating.template.uuid.clone(),
            template_language: templating.language.clone(),
            template_namespace: templating.namespace.clone(),
            template_variables: templating.variables.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TemplateRef;
    use chrono::TimeZone;

    fn sample_envelope() -> SideChannelEnvelope {
        SideChannelEnvelope {
            contact_uuid: Uuid::nil(),
            contact_name: "Ana".into(),
            channel_uuid: Uuid::nil(),
            external_id: "wamid.1".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            direction: Direction::Outgoing,
            channel_type: "WAC".into(),
            text: "hello".into(),
            attachments: vec!["image/jpeg:https://example.com/a.jpg".into()],
            quick_replies: vec!["Yes".into(), "No".into()],
        }
    }

    #[test]
    fn test_envelope_wire_fields() {
        let json = serde_json::to_value(sample_envelope()).unwrap();
        assert_eq!(json["direction"], "O");
        assert_eq!(json["timestamp"], "2024-05-01T12:30:00Z");
        assert_eq!(json["channel_type"], "WAC");
        assert_eq!(json["quick_replies"][1], "No");
        assert_eq!(json.as_object().unwrap().len(), 10);
    }

    #[test]
    fn test_template_envelope_is_flat() {
        let templating = Templating {
            template: TemplateRef {
                uuid: "4ed5000f-5c94-4143-9697-b7cbd230a381".into(),
                name: "order_update".into(),
            },
            language: "spa".into(),
            namespace: "2b3c".into(),
            variables: vec!["1234".into()],
        };
        let json = serde_json::to_value(TemplateEnvelope::new(sample_envelope(), &templating)).unwrap();
        assert_eq!(json["contact_name"], "Ana");
        assert_eq!(json["template_name"], "order_update");
        assert_eq!(json["template_language"], "spa");
        assert_eq!(json["template_variables"][0], "1234");
        assert!(json.get("envelope").is_none());
    }
}
