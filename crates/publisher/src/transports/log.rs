//! LogTransport - logs envelope summaries via tracing

use bytes::Bytes;
use tracing::{info, instrument};

use crate::error::PublishError;
use crate::transport::Transport;

/// Transport that only logs what would have been published
pub struct LogTransport {
    name: String,
    connected: bool,
}

impl LogTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connected: false,
        }
    }
}

impl Transport for LogTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self) -> Result<(), PublishError> {
        self.connected = true;
        Ok(())
    }

    #[instrument(
        name = "log_transport_publish",
        skip(self, payload),
        fields(target_name = %self.name)
    )]
    async fn publish(&mut self, routing_key: &str, payload: &Bytes) -> Result<(), PublishError> {
        info!(
            target_name = %self.name,
            routing_key,
            bytes = payload.len(),
            payload = %String::from_utf8_lossy(payload),
            "Side-channel envelope"
        );
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    async fn close(&mut self) -> Result<(), PublishError> {
        self.connected = false;
        info!(target_name = %self.name, "LogTransport closed");
        Ok(())
    }
}
