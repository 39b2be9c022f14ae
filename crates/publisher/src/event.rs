//! EventPublisher trait - fire-and-forget side-channel publishing

use crate::request::PublishRequest;

/// Asynchronous, non-blocking publisher
///
/// `send_async` never waits on the broker and never reports failure to the
/// caller; outcomes are only visible through hooks, logs and metrics.
pub trait EventPublisher: Send + Sync {
    fn name(&self) -> &str;

    /// Hand the request over to background delivery
    fn send_async(&self, request: PublishRequest);
}
