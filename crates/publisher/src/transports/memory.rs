//! MemoryTransport - in-process broker for tests and dry runs
//!
//! The broker side is shared, so a test can keep a [`MemoryBroker`] clone
//! to inspect deliveries and inject faults while the transport is owned
//! by a publisher worker.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;

use crate::error::PublishError;
use crate::transport::Transport;

#[derive(Debug, Default)]
struct BrokerState {
    published: Vec<(String, Bytes)>,
    publish_attempts: u32,
    connect_count: u32,
    fail_publishes: u32,
    fail_connects: u32,
    publish_delay: Option<Duration>,
}

/// Shared in-memory broker
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next `n` publishes fail with a dropped connection
    pub fn fail_next_publishes(&self, n: u32) {
        self.state().fail_publishes = n;
    }

    /// Make the next `n` connects fail
    pub fn fail_next_connects(&self, n: u32) {
        self.state().fail_connects = n;
    }

    pub fn set_publish_delay(&self, delay: Duration) {
        self.state().publish_delay = Some(delay);
    }

    /// Delivered envelopes as (routing key, payload)
    pub fn published(&self) -> Vec<(String, Bytes)> {
        self.state().published.clone()
    }

    pub fn published_keys(&self) -> Vec<String> {
        self.state()
            .published
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Publish calls, successful or not
    pub fn publish_attempts(&self) -> u32 {
        self.state().publish_attempts
    }

    /// Successful connects
    pub fn connect_count(&self) -> u32 {
        self.state().connect_count
    }
}

/// Transport delivering into a [`MemoryBroker`]
pub struct MemoryTransport {
    name: String,
    broker: MemoryBroker,
    connected: bool,
}

impl MemoryTransport {
    pub fn new(name: impl Into<String>, broker: MemoryBroker) -> Self {
        Self {
            name: name.into(),
            broker,
            connected: false,
        }
    }
}

impl Transport for MemoryTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self) -> Result<(), PublishError> {
        let mut state = self.broker.state();
        if state.fail_connects > 0 {
            state.fail_connects -= 1;
            return Err(PublishError::connect(&self.name, "connection refused"));
        }
        state.connect_count += 1;
        self.connected = true;
        Ok(())
    }

    async fn publish(&mut self, routing_key: &str, payload: &Bytes) -> Result<(), PublishError> {
        let delay = self.broker.state().publish_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.broker.state();
        state.publish_attempts += 1;
        if state.fail_publishes > 0 {
            state.fail_publishes -= 1;
            self.connected = false;
            return Err(PublishError::publish(&self.name, "connection reset", true));
        }
        state.published.push((routing_key.to_string(), payload.clone()));
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    async fn close(&mut self) -> Result<(), PublishError> {
        self.connected = false;
        Ok(())
    }
}
