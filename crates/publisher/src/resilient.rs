//! ResilientPublisher - one broker target with an isolated queue and worker
//!
//! The worker owns the transport, so reconnects are serialized: a dropped
//! connection is re-established by the next attempt and never by two tasks
//! at once.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::error::PublishError;
use crate::event::EventPublisher;
use crate::metrics::PublisherMetrics;
use crate::request::{run_hook, PublishRequest};
use crate::transport::Transport;

/// Retry budget for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
    /// Deadline for one connect + publish attempt
    pub timeout: Duration,
}

/// Attempt deadline unless configured otherwise
const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
            timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Handle to a running publisher worker
pub struct ResilientPublisher {
    name: String,
    tx: mpsc::Sender<PublishRequest>,
    metrics: Arc<PublisherMetrics>,
    worker_handle: JoinHandle<()>,
}

impl ResilientPublisher {
    /// Spawn the worker task owning `transport`
    pub fn spawn<T: Transport + 'static>(transport: T, policy: RetryPolicy, queue_capacity: usize) -> Self {
        let name = transport.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(PublisherMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            publish_worker(transport, rx, policy, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<PublisherMetrics> {
        &self.metrics
    }

    /// Queue a request (non-blocking)
    ///
    /// Returns false when the request was dropped; hooks of a dropped
    /// request are not run.
    pub fn try_send(&self, request: PublishRequest) -> bool {
        match self.tx.try_send(request) {
            Ok(()) => {
                self.metrics.inc_queued_count();
                true
            }
            Err(mpsc::error::TrySendError::Full(r)) => {
                self.metrics.inc_dropped_count();
                observability::record_publisher_outcome(&self.name, "dropped");
                warn!(
                    target_name = %self.name,
                    routing_key = %r.routing_key,
                    "Publish queue full, envelope dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(r)) => {
                self.metrics.inc_dropped_count();
                error!(
                    target_name = %self.name,
                    routing_key = %r.routing_key,
                    "Publisher worker closed unexpectedly"
                );
                false
            }
        }
    }

    /// Drain the queue and stop the worker
    #[instrument(name = "resilient_publisher_shutdown", skip(self), fields(target_name = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(target_name = %self.name, error = ?e, "Publisher worker panicked");
        }
        debug!(target_name = %self.name, "Publisher shutdown complete");
    }
}

impl EventPublisher for ResilientPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    fn send_async(&self, request: PublishRequest) {
        self.try_send(request);
    }
}

#[instrument(
    name = "publisher_worker_loop",
    skip(transport, rx, policy, metrics),
    fields(target_name = %name)
)]
async fn publish_worker<T: Transport>(
    mut transport: T,
    mut rx: mpsc::Receiver<PublishRequest>,
    policy: RetryPolicy,
    metrics: Arc<PublisherMetrics>,
    name: String,
) {
    debug!(target_name = %name, "Publisher worker started");

    while let Some(request) = rx.recv().await {
        run_hook(&name, "pre", request.pre_hook.as_ref(), &metrics);

        if publish_with_retry(&mut transport, &request, policy, &metrics, &name).await {
            metrics.inc_published_count();
            observability::record_publisher_outcome(&name, "published");
        } else {
            metrics.inc_failed_count();
            observability::record_publisher_outcome(&name, "failed");
        }

        // Runs whatever the outcome
        run_hook(&name, "post", request.post_hook.as_ref(), &metrics);
    }

    if let Err(e) = transport.close().await {
        warn!(target_name = %name, error = %e, "Close failed on shutdown");
    }

    debug!(target_name = %name, "Publisher worker stopped");
}

async fn publish_with_retry<T: Transport>(
    transport: &mut T,
    request: &PublishRequest,
    policy: RetryPolicy,
    metrics: &PublisherMetrics,
    name: &str,
) -> bool {
    for attempt in 1..=policy.attempts {
        match publish_once(transport, request, policy.timeout, metrics, name).await {
            Ok(()) => {
                if attempt > 1 {
                    debug!(target_name = %name, attempt, "Publish succeeded after retry");
                }
                return true;
            }
            Err(e) => {
                warn!(
                    target_name = %name,
                    routing_key = %request.routing_key,
                    attempt,
                    max_attempts = policy.attempts,
                    reconnect = e.connection_dropped(),
                    error = %e,
                    "Publish attempt failed"
                );
                if attempt < policy.attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }

    error!(
        target_name = %name,
        routing_key = %request.routing_key,
        attempts = policy.attempts,
        "Publish retries exhausted, envelope dropped"
    );
    false
}

/// One connect-if-needed + publish, bounded by `limit`
///
/// An attempt that runs out of time leaves the connection in an unknown
/// state, so it is dropped and the next attempt reconnects.
async fn publish_once<T: Transport>(
    transport: &mut T,
    request: &PublishRequest,
    limit: Duration,
    metrics: &PublisherMetrics,
    name: &str,
) -> Result<(), PublishError> {
    let attempt = tokio::time::timeout(limit, async {
        if !transport.is_connected() {
            transport.connect().await?;
            metrics.inc_connect_count();
        }
        transport.publish(&request.routing_key, &request.payload).await
    })
    .await;

    match attempt {
        Ok(result) => result,
        Err(_) => {
            transport.disconnect();
            Err(PublishError::timeout(name, limit))
        }
    }
}
