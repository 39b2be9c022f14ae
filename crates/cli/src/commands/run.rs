//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use crate::cli::RunArgs;
use crate::gateway::{Fixture, Gateway, GatewayRunConfig};

/// Execute the `run` command
pub async fn run_gateway(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let mut config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(workers) = args.max_workers {
        info!(workers, "Overriding worker count from CLI");
        config.sender.max_workers = workers;
    }

    let fixture = match &args.fixture {
        Some(path) => Fixture::load(path)
            .with_context(|| format!("Failed to load fixture from {}", path.display()))?,
        None => Fixture::default(),
    };

    info!(
        workers = config.sender.max_workers,
        wait_media_channels = ?config.sender.wait_media_channels,
        publishers = config.side_channel.publishers.len(),
        messages = fixture.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config, &fixture);
        return Ok(());
    }

    let run_config = GatewayRunConfig {
        metrics_port: if args.metrics_port == 0 {
            config.observability.metrics_port
        } else {
            Some(args.metrics_port)
        },
        config,
        fixture,
        timeout: if args.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(args.timeout))
        },
        vendor_latency: if args.vendor_latency_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(args.vendor_latency_ms))
        },
    };

    info!("Starting gateway...");

    let stats = Gateway::new(run_config)
        .run(setup_shutdown_signal())
        .await
        .context("Gateway run failed")?;

    info!(
        sends = stats.sends.total,
        messages_left = stats.messages_left,
        duration_secs = stats.duration.as_secs_f64(),
        throughput = format!("{:.2}", stats.throughput()),
        "Gateway run completed"
    );
    stats.print_summary();

    info!("Gateway finished");
    Ok(())
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &contracts::GatewayConfig, fixture: &Fixture) {
    let sender = &config.sender;
    println!("\n=== Configuration Summary ===\n");
    println!("Sender:");
    println!("  Workers: {}", sender.max_workers);
    println!(
        "  Timeouts: send={}s action={}s backend={}s finalize={}s",
        sender.send_timeout_secs,
        sender.action_timeout_secs,
        sender.backend_timeout_secs,
        sender.finalize_timeout_secs
    );
    if !sender.wait_media_channels.is_empty() {
        println!(
            "  Ordering wait: {:?} ({} lookups, {}ms apart)",
            sender.wait_media_channels, sender.wait_media_count, sender.wait_media_sleep_ms
        );
    }

    let side_channel = &config.side_channel;
    println!("\nSide channel ({}):", side_channel.publishers.len());
    println!(
        "  Routing keys: billing={} template={}",
        side_channel.billing_routing_key, side_channel.template_routing_key
    );
    for target in &side_channel.publishers {
        println!(
            "  - {} ({:?}, {} attempts)",
            target.name, target.transport, target.retry_attempts
        );
    }

    println!("\nFixture: {} messages", fixture.len());
    for channel_type in fixture.channel_types() {
        println!("  - {}", channel_type);
    }

    println!();
}
