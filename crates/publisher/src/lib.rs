//! # Publisher
//!
//! Side-channel publishing of billing and template events.
//!
//! Responsibilities:
//! - Accept envelopes without ever blocking the send path
//! - Deliver them to broker targets with bounded retry and reconnect
//! - Isolate every target behind its own queue and worker
//! - Run caller hooks around delivery, containing any panic

pub mod error;
pub mod event;
pub mod metrics;
pub mod multi;
pub mod request;
pub mod resilient;
pub mod transport;
pub mod transports;

pub use error::PublishError;
pub use event::EventPublisher;
pub use metrics::{MetricsSnapshot, PublisherMetrics};
pub use multi::MultiPublisher;
pub use request::{Hook, PublishRequest};
pub use resilient::{ResilientPublisher, RetryPolicy};
pub use transport::{LocalTransport, Transport};
pub use transports::{LogTransport, MemoryBroker, MemoryTransport, RedisTransport};
