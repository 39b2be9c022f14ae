//! Transport trait - broker connection owned by a publisher worker
//!
//! A transport is owned by exactly one background worker, so connects,
//! reconnects and publishes on it never run concurrently.

use bytes::Bytes;

use crate::error::PublishError;

/// Broker transport
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    /// Target name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Whether a live connection is held
    fn is_connected(&self) -> bool;

    /// Establish (or re-establish) the connection
    async fn connect(&mut self) -> Result<(), PublishError>;

    /// Publish one encoded envelope
    ///
    /// Implementations drop their connection state when the error means
    /// the connection is gone, so the next attempt reconnects first.
    async fn publish(&mut self, routing_key: &str, payload: &Bytes) -> Result<(), PublishError>;

    /// Forget the connection without talking to the broker
    ///
    /// Called after an attempt was abandoned mid-flight; the next attempt
    /// reconnects.
    fn disconnect(&mut self);

    /// Release the connection
    async fn close(&mut self) -> Result<(), PublishError>;
}
