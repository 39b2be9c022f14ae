//! Ordering barrier
//!
//! Messages of some channel types must not overtake the contact's previous
//! message (media sent right before text arrives after it otherwise). The
//! barrier polls the previous message's status a bounded number of times
//! and then lets the message through regardless.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use contracts::{Backend, MsgUuid, OutgoingMsg, RunEvent, SenderSettings};

use crate::deadline::within;

/// How the barrier was passed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierOutcome {
    /// No earlier message in the contact's history
    NoPredecessor,
    /// The previous message reached delivered/read
    Settled { lookups: u32 },
    /// Lookup budget spent, proceeding anyway
    Exhausted { lookups: u32 },
}

/// Bounded polling barrier
pub struct OrderingBarrier {
    backend: Arc<dyn Backend>,
    max_lookups: u32,
    sleep: Duration,
    backend_timeout: Duration,
}

impl OrderingBarrier {
    pub fn new(backend: Arc<dyn Backend>, settings: &SenderSettings) -> Self {
        Self {
            backend,
            max_lookups: settings.wait_media_count.max(1),
            sleep: settings.wait_media_sleep(),
            backend_timeout: settings.backend_timeout(),
        }
    }

    /// Wait until the previous message settles or the budget runs out
    pub async fn wait(&self, msg: &OutgoingMsg) -> BarrierOutcome {
        let events = match within(
            "get_run_events_by_msg_uuid",
            self.backend_timeout,
            self.backend.get_run_events_by_msg_uuid(msg.uuid),
        )
        .await
        {
            Ok(events) => events,
            Err(e) => {
                warn!(msg_id = %msg.id, error = %e, "Could not load run events, skipping ordering wait");
                return BarrierOutcome::NoPredecessor;
            }
        };

        let Some(previous) = previous_msg_uuid(&events, msg.uuid) else {
            return BarrierOutcome::NoPredecessor;
        };

        for lookup in 1..=self.max_lookups {
            if self.is_settled(msg, previous).await {
                debug!(msg_id = %msg.id, previous = %previous, lookup, "Previous message settled");
                return BarrierOutcome::Settled { lookups: lookup };
            }
            if lookup < self.max_lookups {
                tokio::time::sleep(self.sleep).await;
            }
        }

        debug!(
            msg_id = %msg.id,
            previous = %previous,
            lookups = self.max_lookups,
            "Previous message not settled, sending anyway"
        );
        BarrierOutcome::Exhausted {
            lookups: self.max_lookups,
        }
    }

    async fn is_settled(&self, msg: &OutgoingMsg, previous: MsgUuid) -> bool {
        match within("get_message", self.backend_timeout, self.backend.get_message(previous)).await {
            Ok(Some(record)) => record.status.is_settled(),
            Ok(None) => false,
            Err(e) => {
                // Counts as not settled
                warn!(msg_id = %msg.id, previous = %previous, error = %e, "Previous message lookup failed");
                false
            }
        }
    }
}

/// Nearest `msg_created` event before the message's own one
///
/// Events are oldest first. A message absent from its own history has no
/// known predecessor.
fn previous_msg_uuid(events: &[RunEvent], own: MsgUuid) -> Option<MsgUuid> {
    let own_index = events
        .iter()
        .position(|e| e.is_msg_created() && e.msg_uuid == Some(own))?;

    events[..own_index]
        .iter()
        .rev()
        .filter(|e| e.is_msg_created())
        .find_map(|e| e.msg_uuid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MemoryBackend;
    use crate::test_support::message;
    use chrono::{TimeZone, Utc};
    use contracts::{MsgRecord, MsgStatusValue};
    use uuid::Uuid;

    fn event(event_type: &str, uuid: Option<Uuid>, minute: u32) -> RunEvent {
        RunEvent {
            event_type: event_type.to_string(),
            msg_uuid: uuid,
            created_on: Utc.with_ymd_and_hms(2024, 1, 1, 10, minute, 0).unwrap(),
        }
    }

    fn settings(count: u32) -> SenderSettings {
        SenderSettings {
            wait_media_channels: vec!["WAC".into()],
            wait_media_count: count,
            wait_media_sleep_ms: 1000,
            ..Default::default()
        }
    }

    #[test]
    fn test_previous_msg_uuid() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let events = vec![
            event("msg_created", Some(a), 0),
            event("msg_received", Some(c), 1),
            event("run_result_changed", None, 2),
            event("msg_created", Some(b), 3),
        ];

        assert_eq!(previous_msg_uuid(&events, b), Some(a));
        assert_eq!(previous_msg_uuid(&events, a), None);
        assert_eq!(previous_msg_uuid(&events, Uuid::new_v4()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_predecessor_passes_without_lookup() {
        let backend = Arc::new(MemoryBackend::new());
        let msg = message(1, "WAC");
        backend.set_run_events(msg.uuid, vec![RunEvent::msg_created(msg.uuid, msg.created_on)]);

        let barrier = OrderingBarrier::new(backend.clone(), &settings(5));
        assert_eq!(barrier.wait(&msg).await, BarrierOutcome::NoPredecessor);
        assert_eq!(backend.calls().get_message, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_predecessor_passes() {
        let backend = Arc::new(MemoryBackend::new());
        let first = message(1, "WAC");
        let second = message(2, "WAC");
        let first_uuid = first.uuid;
        backend.push_conversation(vec![first, second.clone()]);
        backend.set_message(MsgRecord {
            id: contracts::MsgId(1),
            uuid: first_uuid,
            status: MsgStatusValue::Delivered,
        });

        let barrier = OrderingBarrier::new(backend.clone(), &settings(5));
        assert_eq!(barrier.wait(&second).await, BarrierOutcome::Settled { lookups: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsettled_predecessor_exhausts_budget() {
        let backend = Arc::new(MemoryBackend::new());
        let first = message(1, "WAC");
        let second = message(2, "WAC");
        backend.push_conversation(vec![first, second.clone()]);

        let barrier = OrderingBarrier::new(backend.clone(), &settings(3));
        let started = tokio::time::Instant::now();
        assert_eq!(barrier.wait(&second).await, BarrierOutcome::Exhausted { lookups: 3 });

        assert_eq!(backend.calls().get_message, 3);
        // Sleeps only between lookups
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_errors_count_as_unsettled() {
        let backend = Arc::new(MemoryBackend::new());
        let first = message(1, "WAC");
        let second = message(2, "WAC");
        backend.push_conversation(vec![first, second.clone()]);
        backend.fail_operation("get_message");

        let barrier = OrderingBarrier::new(backend.clone(), &settings(4));
        assert_eq!(barrier.wait(&second).await, BarrierOutcome::Exhausted { lookups: 4 });
        assert_eq!(backend.calls().get_message, 4);
    }
}
