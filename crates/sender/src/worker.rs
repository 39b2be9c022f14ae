//! MsgDispatcher - the per-message send pipeline run by every worker
//!
//! Order of steps: action short-cut, resend marker reset, dedup check,
//! loop check, ordering barrier, vendor dispatch, side-channel fan-out,
//! finalization. No step reports errors to the caller; failures end up in
//! the status, the channel logs, the logs and the metrics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use contracts::{
    Backend, ChannelLogType, ChannelLogger, ChannelType, DispatchRequest, HandlerError, MsgId,
    MsgStatus, MsgStatusValue, OutgoingMsg, SenderSettings,
};
use observability::{record_action, record_msg_sent};

use crate::barrier::OrderingBarrier;
use crate::deadline::within;
use crate::fanout::SideChannel;
use crate::registry::HandlerRegistry;

/// Error code of the synthetic loop log entry
const MSG_LOOP_CODE: &str = "msg_loop";
const MSG_LOOP_MESSAGE: &str = "message loop detected";

/// Result of one message send, reported to an optional observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub msg_id: MsgId,
    pub channel_type: ChannelType,
    pub status: MsgStatusValue,
    pub elapsed: Duration,
}

/// Shared send pipeline
pub struct MsgDispatcher {
    backend: Arc<dyn Backend>,
    registry: Arc<HandlerRegistry>,
    side_channel: SideChannel,
    barrier: OrderingBarrier,
    settings: SenderSettings,
    outcomes: Option<mpsc::UnboundedSender<DispatchOutcome>>,
    outcomes_closed: AtomicBool,
}

impl MsgDispatcher {
    pub fn new(
        backend: Arc<dyn Backend>,
        registry: Arc<HandlerRegistry>,
        side_channel: SideChannel,
        settings: SenderSettings,
    ) -> Self {
        let barrier = OrderingBarrier::new(Arc::clone(&backend), &settings);
        Self {
            backend,
            registry,
            side_channel,
            barrier,
            settings,
            outcomes: None,
            outcomes_closed: AtomicBool::new(false),
        }
    }

    /// Report every finished send on `tx`
    ///
    /// The observer is optional; once its receiver is gone outcomes are
    /// no longer reported and sending carries on.
    pub fn with_outcomes(mut self, tx: mpsc::UnboundedSender<DispatchOutcome>) -> Self {
        self.outcomes = Some(tx);
        self
    }

    pub fn settings(&self) -> &SenderSettings {
        &self.settings
    }

    /// Run the whole pipeline for one message
    ///
    /// Returns the final status, or `None` for actions which never get one.
    #[instrument(
        name = "msg_dispatch",
        skip(self, msg),
        fields(
            msg_id = %msg.id,
            channel_type = %msg.channel_type(),
            channel_uuid = %msg.channel.uuid
        )
    )]
    pub async fn dispatch(&self, msg: OutgoingMsg) -> Option<MsgStatus> {
        if msg.is_action() {
            self.send_action(&msg).await;
            return None;
        }

        if msg.is_resend {
            let cleared = within(
                "clear_msg_sent",
                self.settings.backend_timeout(),
                self.backend.clear_msg_sent(msg.id),
            )
            .await;
            if let Err(e) = cleared {
                warn!(msg_id = %msg.id, error = %e, "Error clearing sent marker for resend");
            }
        }

        let started = Instant::now();
        let mut log = ChannelLogger::new(ChannelLogType::MsgSend, msg.channel.uuid, Some(msg.id));

        let mut status = if self.was_sent(&msg).await {
            info!(msg_id = %msg.id, "Message already sent, marking as wired");
            self.backend
                .new_msg_status_for_id(&msg.channel, msg.id, MsgStatusValue::Wired)
        } else if self.is_loop(&msg).await {
            warn!(msg_id = %msg.id, "Message loop detected, failing message");
            log.set_log_type(ChannelLogType::MsgLoop);
            log.error(MSG_LOOP_CODE, MSG_LOOP_MESSAGE);
            self.backend
                .new_msg_status_for_id(&msg.channel, msg.id, MsgStatusValue::Failed)
        } else {
            if self.settings.waits_for_media(msg.channel_type()) {
                let outcome = self.barrier.wait(&msg).await;
                debug!(msg_id = %msg.id, ?outcome, "Ordering barrier passed");
            }
            self.send_to_vendor(&msg, &mut log).await
        };

        let elapsed = started.elapsed();
        status.add_logs(log.into_logs());

        record_msg_sent(
            msg.channel_type().as_str(),
            &msg.channel.uuid.to_string(),
            status.status.as_str(),
            elapsed,
        );
        debug!(
            msg_id = %msg.id,
            status = %status.status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Message dispatched"
        );

        self.side_channel.publish(&msg, &status);

        self.report_outcome(DispatchOutcome {
            msg_id: msg.id,
            channel_type: msg.channel_type().clone(),
            status: status.status,
            elapsed,
        });

        self.finalize(&msg, &status).await;
        Some(status)
    }

    fn report_outcome(&self, outcome: DispatchOutcome) {
        let Some(tx) = &self.outcomes else {
            return;
        };
        if tx.send(outcome).is_err() && !self.outcomes_closed.swap(true, Ordering::Relaxed) {
            debug!("Outcome observer closed, outcomes no longer reported");
        }
    }

    /// Actions never get a status; failures are only logged
    async fn send_action(&self, msg: &OutgoingMsg) {
        let mut log = ChannelLogger::new(ChannelLogType::MsgAction, msg.channel.uuid, Some(msg.id));
        let request = DispatchRequest::action(msg);
        let limit = self.settings.action_timeout();

        let result = match self.registry.get(msg.channel_type()) {
            None => Err(HandlerError::NoHandler {
                channel_type: msg.channel_type().clone(),
            }),
            Some(handler) => match handler.action_sender() {
                None => Err(HandlerError::ActionsUnsupported {
                    channel_type: msg.channel_type().clone(),
                }),
                Some(sender) => tokio::time::timeout(limit, sender.send_action(&request, &mut log))
                    .await
                    .unwrap_or(Err(HandlerError::Timeout(limit))),
            },
        };

        record_action(msg.channel_type().as_str(), result.is_ok());
        match result {
            Ok(status) => debug!(msg_id = %msg.id, status = %status.status, "Action sent"),
            Err(e) => warn!(msg_id = %msg.id, action = ?msg.action, error = %e, "Error sending action"),
        }
    }

    async fn send_to_vendor(&self, msg: &OutgoingMsg, log: &mut ChannelLogger) -> MsgStatus {
        let Some(handler) = self.registry.get(msg.channel_type()) else {
            let err = HandlerError::NoHandler {
                channel_type: msg.channel_type().clone(),
            };
            return self.errored(msg, log, err);
        };

        let limit = self.settings.send_timeout();
        let request = DispatchRequest::message(msg);
        match tokio::time::timeout(limit, handler.send(&request, log)).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => self.errored(msg, log, e),
            Err(_) => self.errored(msg, log, HandlerError::Timeout(limit)),
        }
    }

    fn errored(&self, msg: &OutgoingMsg, log: &mut ChannelLogger, err: HandlerError) -> MsgStatus {
        warn!(msg_id = %msg.id, error = %err, "Error sending message");
        if !log.has_error() {
            log.handler_error(&err);
        }
        self.backend
            .new_msg_status_for_id(&msg.channel, msg.id, MsgStatusValue::Errored)
    }

    async fn was_sent(&self, msg: &OutgoingMsg) -> bool {
        within(
            "was_msg_sent",
            self.settings.backend_timeout(),
            self.backend.was_msg_sent(msg.id),
        )
        .await
        .unwrap_or_else(|e| {
            warn!(msg_id = %msg.id, error = %e, "Error checking sent marker, assuming unsent");
            false
        })
    }

    async fn is_loop(&self, msg: &OutgoingMsg) -> bool {
        within(
            "is_msg_loop",
            self.settings.backend_timeout(),
            self.backend.is_msg_loop(msg),
        )
        .await
        .unwrap_or_else(|e| {
            warn!(msg_id = %msg.id, error = %e, "Error checking message loop, assuming none");
            false
        })
    }

    /// Persist the outcome within the finalize budget
    ///
    /// Every step runs even when an earlier one failed.
    async fn finalize(&self, msg: &OutgoingMsg, status: &MsgStatus) {
        let deadline = Instant::now() + self.settings.finalize_timeout();

        if let Err(e) = within(
            "write_msg_status",
            self.step_limit(deadline),
            self.backend.write_msg_status(status),
        )
        .await
        {
            warn!(msg_id = %msg.id, status = %status.status, error = %e, "Error writing msg status");
        }

        if !status.logs.is_empty() {
            if let Err(e) = within(
                "write_channel_logs",
                self.step_limit(deadline),
                self.backend.write_channel_logs(&status.logs),
            )
            .await
            {
                warn!(msg_id = %msg.id, logs = status.logs.len(), error = %e, "Error writing channel logs");
            }
        }

        if let Err(e) = within(
            "mark_outgoing_msg_complete",
            self.step_limit(deadline),
            self.backend.mark_outgoing_msg_complete(msg, status),
        )
        .await
        {
            warn!(msg_id = %msg.id, error = %e, "Error marking message as complete");
        }
    }

    fn step_limit(&self, deadline: Instant) -> Duration {
        deadline
            .saturating_duration_since(Instant::now())
            .min(self.settings.backend_timeout())
    }
}
