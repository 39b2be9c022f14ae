//! Gateway orchestrator - wires backend, handlers, publishers and scheduler.
//!
//! Vendor handlers and the production backend live outside this workspace,
//! so a run uses the in-memory backend seeded from a fixture and a scripted
//! handler per channel type. Side-channel publishers are real.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{ChannelHandler, GatewayConfig};
use publisher::{EventPublisher, MultiPublisher};
use sender::{
    HandlerRegistry, MemoryBackend, MsgDispatcher, Scheduler, ScriptedHandler, SideChannel,
    TaskTracker,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{Fixture, RunStats};

/// How often the run loop checks for a drained queue
const DRAIN_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Gateway run configuration
#[derive(Debug, Clone)]
pub struct GatewayRunConfig {
    /// Loaded configuration
    pub config: GatewayConfig,

    /// Messages to queue
    pub fixture: Fixture,

    /// Run timeout (None = until drained or interrupted)
    pub timeout: Option<Duration>,

    /// Simulated vendor latency
    pub vendor_latency: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main gateway orchestrator
pub struct Gateway {
    config: GatewayRunConfig,
}

impl Gateway {
    pub fn new(config: GatewayRunConfig) -> Self {
        Self { config }
    }

    /// Run until the fixture is drained, the timeout hits or `shutdown` resolves
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<RunStats> {
        let start_time = Instant::now();
        let settings = self.config.config.sender.clone();

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        // Backend
        let backend = Arc::new(MemoryBackend::new());
        let registry = self.build_registry()?;
        let messages_queued = self.config.fixture.len();
        self.config.fixture.clone().seed(&backend);
        info!(messages = messages_queued, "In-memory backend seeded");

        // Side channel
        let publishers = &self.config.config.side_channel.publishers;
        let publisher = Arc::new(
            MultiPublisher::from_config(publishers).context("Failed to create side-channel publishers")?,
        );
        if publisher.is_empty() {
            warn!("No side-channel publishers configured - billing/template events are dropped");
        }
        let side_channel = SideChannel::new(
            (!publisher.is_empty()).then(|| Arc::clone(&publisher) as Arc<dyn EventPublisher>),
            &self.config.config.side_channel,
        );

        // Scheduler
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let dispatcher = MsgDispatcher::new(
            backend.clone(),
            Arc::new(registry),
            side_channel,
            settings.clone(),
        )
        .with_outcomes(outcome_tx);

        let tracker = TaskTracker::new();
        let scheduler = Scheduler::new(backend.clone(), Arc::new(dispatcher), tracker.clone());
        scheduler.start().context("Failed to start scheduler")?;

        if settings.max_workers == 0 {
            warn!("max_workers is 0 - sending is disabled, waiting for timeout or signal");
        }

        let mut stats = RunStats {
            messages_queued,
            workers: settings.max_workers,
            ..Default::default()
        };

        let deadline = self.config.timeout.map(|t| tokio::time::Instant::now() + t);
        let timed_out = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(timed_out);
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(DRAIN_CHECK_INTERVAL);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    warn!("Received shutdown signal, stopping gateway...");
                    break;
                }
                _ = &mut timed_out => {
                    warn!("Run timed out");
                    break;
                }
                Some(outcome) = outcome_rx.recv() => {
                    stats.sends.update(outcome.channel_type.as_str(), outcome.status.as_str(), outcome.elapsed);
                }
                _ = ticker.tick() => {
                    if settings.max_workers > 0
                        && backend.queue_len() == 0
                        && scheduler.idle_workers() == settings.max_workers
                    {
                        info!("Queue drained");
                        break;
                    }
                }
            }
        }

        // Shutdown
        info!("Shutting down gateway...");
        scheduler.stop();
        tracker.close();
        tracker.wait().await;
        drop(scheduler);

        while let Ok(outcome) = outcome_rx.try_recv() {
            stats.sends.update(outcome.channel_type.as_str(), outcome.status.as_str(), outcome.elapsed);
        }

        stats.publishers = match Arc::try_unwrap(publisher) {
            Ok(publisher) => publisher.shutdown().await,
            Err(publisher) => {
                warn!("Publisher still referenced, skipping queue drain");
                publisher.metrics()
            }
        };

        stats.messages_left = backend.queue_len();
        stats.backend_calls = backend.calls();
        stats.duration = start_time.elapsed();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            sends = stats.sends.total,
            "Gateway shutdown complete"
        );

        Ok(stats)
    }

    fn build_registry(&self) -> Result<HandlerRegistry> {
        let mut registry = HandlerRegistry::new();
        for channel_type in self.config.fixture.channel_types() {
            let mut handler = ScriptedHandler::new(channel_type.clone()).with_actions();
            if let Some(latency) = self.config.vendor_latency {
                handler = handler.with_delay(latency);
            }
            registry
                .register(Arc::new(handler) as Arc<dyn ChannelHandler>)
                .with_context(|| format!("Failed to register handler for {channel_type}"))?;
        }
        info!(channel_types = ?registry.channel_types(), "Handler registry built");
        Ok(registry)
    }
}
