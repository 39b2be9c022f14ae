//! Side-channel fan-out of billing and template events

use std::sync::Arc;

use tracing::{debug, warn};

use contracts::{MsgStatus, OutgoingMsg, SideChannelEnvelope, SideChannelSettings, TemplateEnvelope};
use observability::record_side_channel_publish;
use publisher::{EventPublisher, Hook, PublishRequest};

use crate::error::SenderError;

const KIND_BILLING: &str = "billing";
const KIND_TEMPLATE: &str = "template";

/// Envelopes queued for one message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub billing: bool,
    pub template: bool,
}

/// Builds envelopes and hands them to the publisher
///
/// Without a publisher every call is a no-op.
pub struct SideChannel {
    publisher: Option<Arc<dyn EventPublisher>>,
    billing_routing_key: String,
    template_routing_key: String,
}

impl SideChannel {
    pub fn new(publisher: Option<Arc<dyn EventPublisher>>, settings: &SideChannelSettings) -> Self {
        Self {
            publisher,
            billing_routing_key: settings.billing_routing_key.clone(),
            template_routing_key: settings.template_routing_key.clone(),
        }
    }

    /// Side channel with publishing disabled
    pub fn disabled() -> Self {
        Self::new(None, &SideChannelSettings::default())
    }

    pub fn is_enabled(&self) -> bool {
        self.publisher.is_some()
    }

    /// Queue the events for a dispatched message
    ///
    /// Failed statuses produce nothing. Billing is always queued otherwise;
    /// the template event only when the message carries a complete template
    /// reference.
    pub fn publish(&self, msg: &OutgoingMsg, status: &MsgStatus) -> FanoutReport {
        let mut report = FanoutReport::default();
        let Some(publisher) = &self.publisher else {
            return report;
        };
        if status.status.is_failure() {
            return report;
        }

        let envelope = SideChannelEnvelope::outgoing(msg, status);

        if let Some(templating) = msg.templating().filter(|t| t.is_complete()) {
            let template = TemplateEnvelope::new(envelope.clone(), &templating);
            report.template = self
                .enqueue(publisher.as_ref(), KIND_TEMPLATE, &self.template_routing_key, &template)
                .map_err(|e| warn!(msg_id = %msg.id, error = %e, "Template envelope not queued"))
                .is_ok();
        }

        report.billing = self
            .enqueue(publisher.as_ref(), KIND_BILLING, &self.billing_routing_key, &envelope)
            .map_err(|e| warn!(msg_id = %msg.id, error = %e, "Billing envelope not queued"))
            .is_ok();

        debug!(
            msg_id = %msg.id,
            billing = report.billing,
            template = report.template,
            "Side-channel events queued"
        );
        report
    }

    fn enqueue<T: serde::Serialize>(
        &self,
        publisher: &dyn EventPublisher,
        kind: &'static str,
        routing_key: &str,
        envelope: &T,
    ) -> Result<(), SenderError> {
        let request = PublishRequest::json(envelope, routing_key)?
            .with_pre_hook(stage_hook(kind, "started"))
            .with_post_hook(stage_hook(kind, "finished"));

        record_side_channel_publish(kind, "queued");
        publisher.send_async(request);
        Ok(())
    }
}

fn stage_hook(kind: &'static str, stage: &'static str) -> Hook {
    Arc::new(move || record_side_channel_publish(kind, stage))
}
