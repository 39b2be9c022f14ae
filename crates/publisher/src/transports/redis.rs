//! RedisTransport - XADD envelopes onto a Redis stream

use bytes::Bytes;
use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError};
use tracing::{debug, info, instrument};

use crate::error::PublishError;
use crate::transport::Transport;

/// Transport appending each envelope to a stream
///
/// Entries carry two fields, `routing_key` and `payload`, so consumers can
/// filter billing and template events out of a single stream.
pub struct RedisTransport {
    name: String,
    stream: String,
    client: Client,
    conn: Option<MultiplexedConnection>,
}

impl RedisTransport {
    /// Build a transport; the connection is opened lazily by the first publish
    pub fn new(
        name: impl Into<String>,
        url: &str,
        stream: impl Into<String>,
    ) -> Result<Self, PublishError> {
        let name = name.into();
        let client = Client::open(url).map_err(|e| PublishError::config(&name, e.to_string()))?;

        Ok(Self {
            name,
            stream: stream.into(),
            client,
            conn: None,
        })
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    fn publish_error(&self, e: RedisError) -> PublishError {
        let dropped = e.is_connection_dropped() || e.is_io_error() || e.is_connection_refusal();
        PublishError::publish(&self.name, e.to_string(), dropped)
    }
}

impl Transport for RedisTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    #[instrument(name = "redis_transport_connect", skip(self), fields(target_name = %self.name))]
    async fn connect(&mut self) -> Result<(), PublishError> {
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| PublishError::connect(&self.name, e.to_string()))?;
        self.conn = Some(conn);
        info!(target_name = %self.name, stream = %self.stream, "Connected to Redis");
        Ok(())
    }

    async fn publish(&mut self, routing_key: &str, payload: &Bytes) -> Result<(), PublishError> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(PublishError::publish(&self.name, "not connected", true));
        };

        // XADD stream * routing_key <key> payload <json>
        let result: Result<String, RedisError> = redis::cmd("XADD")
            .arg(&self.stream)
            .arg("*")
            .arg("routing_key")
            .arg(routing_key)
            .arg("payload")
            .arg(payload.as_ref())
            .query_async(conn)
            .await;

        match result {
            Ok(entry_id) => {
                debug!(target_name = %self.name, entry_id = %entry_id, routing_key, "Envelope appended");
                Ok(())
            }
            Err(e) => {
                let err = self.publish_error(e);
                if err.connection_dropped() {
                    self.conn = None;
                }
                Err(err)
            }
        }
    }

    fn disconnect(&mut self) {
        self.conn = None;
    }

    async fn close(&mut self) -> Result<(), PublishError> {
        self.conn = None;
        Ok(())
    }
}
