//! MultiPublisher - fan-out of side-channel envelopes to every broker target

use std::sync::Arc;

use tracing::{info, instrument};

use contracts::{PublisherTargetConfig, TransportKind};

use crate::error::PublishError;
use crate::event::EventPublisher;
use crate::metrics::MetricsSnapshot;
use crate::request::PublishRequest;
use crate::resilient::{ResilientPublisher, RetryPolicy};
use crate::transports::{LogTransport, RedisTransport};

/// Composite publisher
///
/// Each target has its own queue and worker, so a slow or unreachable
/// broker never holds up the others. Hooks are shared and run once per
/// target.
pub struct MultiPublisher {
    name: String,
    targets: Vec<ResilientPublisher>,
}

impl MultiPublisher {
    /// Compose already spawned targets
    pub fn with_targets(targets: Vec<ResilientPublisher>) -> Self {
        let name = targets
            .iter()
            .map(ResilientPublisher::name)
            .collect::<Vec<_>>()
            .join("+");
        Self { name, targets }
    }

    /// Build and spawn every configured target
    ///
    /// Must be called inside a tokio runtime. Connections are opened by
    /// the first publish, so an unreachable broker does not fail startup.
    #[instrument(name = "multi_publisher_from_config", skip(configs), fields(targets = configs.len()))]
    pub fn from_config(configs: &[PublisherTargetConfig]) -> Result<Self, PublishError> {
        let mut targets = Vec::with_capacity(configs.len());
        for config in configs {
            targets.push(create_target(config)?);
        }
        info!(targets = targets.len(), "Side-channel publishers started");
        Ok(Self::with_targets(targets))
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Metrics for all targets
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.targets
            .iter()
            .map(|t| (t.name().to_string(), t.metrics().snapshot()))
            .collect()
    }

    /// Drain and stop every target
    ///
    /// Returns the final metrics of every target.
    #[instrument(name = "multi_publisher_shutdown", skip(self))]
    pub async fn shutdown(self) -> Vec<(String, MetricsSnapshot)> {
        let mut final_metrics = Vec::with_capacity(self.targets.len());
        for target in self.targets {
            let name = target.name().to_string();
            let metrics = Arc::clone(target.metrics());
            target.shutdown().await;
            final_metrics.push((name, metrics.snapshot()));
        }
        info!("Side-channel publishers stopped");
        final_metrics
    }
}

impl EventPublisher for MultiPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    fn send_async(&self, request: PublishRequest) {
        for target in &self.targets {
            target.try_send(request.clone());
        }
    }
}

/// Create a ResilientPublisher from configuration
#[instrument(
    name = "multi_publisher_create_target",
    skip(config),
    fields(target_name = %config.name, transport = ?config.transport)
)]
fn create_target(config: &PublisherTargetConfig) -> Result<ResilientPublisher, PublishError> {
    let policy = RetryPolicy::new(config.retry_attempts, config.retry_delay())
        .with_timeout(config.publish_timeout());

    match config.transport {
        TransportKind::Log => {
            let transport = LogTransport::new(&config.name);
            Ok(ResilientPublisher::spawn(transport, policy, config.queue_capacity))
        }
        TransportKind::Redis => {
            let url = config
                .url
                .as_deref()
                .ok_or_else(|| PublishError::config(&config.name, "missing 'url' for redis transport"))?;
            let transport = RedisTransport::new(&config.name, url, &config.stream)?;
            Ok(ResilientPublisher::spawn(transport, policy, config.queue_capacity))
        }
    }
}
