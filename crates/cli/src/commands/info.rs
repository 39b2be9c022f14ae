//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::GatewayConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    sender: SenderInfo,
    side_channel: SideChannelInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    publishers: Vec<PublisherInfo>,
}

#[derive(Serialize)]
struct SenderInfo {
    max_workers: usize,
    send_timeout_secs: u64,
    action_timeout_secs: u64,
    backend_timeout_secs: u64,
    finalize_timeout_secs: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    wait_media_channels: Vec<String>,
    wait_media_count: u32,
    wait_media_sleep_ms: u64,
}

#[derive(Serialize)]
struct SideChannelInfo {
    billing_routing_key: String,
    template_routing_key: String,
    publisher_count: usize,
}

#[derive(Serialize)]
struct PublisherInfo {
    name: String,
    transport: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    stream: String,
    retry_attempts: u32,
    retry_delay_ms: u64,
    publish_timeout_ms: u64,
    queue_capacity: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&config, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config, args);
    }

    Ok(())
}

fn build_config_info(config: &GatewayConfig, args: &InfoArgs) -> ConfigInfo {
    let sender = &config.sender;
    let side_channel = &config.side_channel;

    let publishers = if args.publishers {
        side_channel
            .publishers
            .iter()
            .map(|target| PublisherInfo {
                name: target.name.clone(),
                transport: format!("{:?}", target.transport).to_lowercase(),
                url: target.url.clone(),
                stream: target.stream.clone(),
                retry_attempts: target.retry_attempts,
                retry_delay_ms: target.retry_delay_ms,
                publish_timeout_ms: target.publish_timeout_ms,
                queue_capacity: target.queue_capacity,
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", config.version),
        sender: SenderInfo {
            max_workers: sender.max_workers,
            send_timeout_secs: sender.send_timeout_secs,
            action_timeout_secs: sender.action_timeout_secs,
            backend_timeout_secs: sender.backend_timeout_secs,
            finalize_timeout_secs: sender.finalize_timeout_secs,
            wait_media_channels: sender
                .wait_media_channels
                .iter()
                .map(|c| c.to_string())
                .collect(),
            wait_media_count: sender.wait_media_count,
            wait_media_sleep_ms: sender.wait_media_sleep_ms,
        },
        side_channel: SideChannelInfo {
            billing_routing_key: side_channel.billing_routing_key.clone(),
            template_routing_key: side_channel.template_routing_key.clone(),
            publisher_count: side_channel.publishers.len(),
        },
        publishers,
    }
}

fn print_config_info(config: &GatewayConfig, args: &InfoArgs) {
    let sender = &config.sender;
    let side_channel = &config.side_channel;

    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                  Gateway Configuration Info                  ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("Version: {:?}\n", config.version);

    println!("┌─ Sender ─────────────────────────────────────────────────────┐");
    println!("│ Workers:          {:<43}│", sender.max_workers);
    println!("│ Send timeout:     {:<43}│", format!("{}s", sender.send_timeout_secs));
    println!("│ Action timeout:   {:<43}│", format!("{}s", sender.action_timeout_secs));
    println!("│ Backend timeout:  {:<43}│", format!("{}s", sender.backend_timeout_secs));
    println!("│ Finalize budget:  {:<43}│", format!("{}s", sender.finalize_timeout_secs));
    if !sender.wait_media_channels.is_empty() {
        let channels: Vec<String> = sender
            .wait_media_channels
            .iter()
            .map(|c| c.to_string())
            .collect();
        println!("│ Ordering wait:    {:<43}│", channels.join(", "));
        println!(
            "│   lookups:        {:<43}│",
            format!("{} x {}ms", sender.wait_media_count, sender.wait_media_sleep_ms)
        );
    }
    println!("└──────────────────────────────────────────────────────────────┘\n");

    println!("┌─ Side Channel ───────────────────────────────────────────────┐");
    println!("│ Billing key:      {:<43}│", side_channel.billing_routing_key);
    println!("│ Template key:     {:<43}│", side_channel.template_routing_key);
    println!("│ Publishers:       {:<43}│", side_channel.publishers.len());
    println!("└──────────────────────────────────────────────────────────────┘\n");

    if args.publishers && !side_channel.publishers.is_empty() {
        println!("┌─ Publishers ─────────────────────────────────────────────────┐");
        for target in &side_channel.publishers {
            println!("│ {:<61}│", target.name);
            println!(
                "│   transport: {:<48}│",
                format!("{:?}", target.transport).to_lowercase()
            );
            if let Some(ref url) = target.url {
                println!("│   url:       {:<48}│", url);
            }
            println!("│   stream:    {:<48}│", target.stream);
            println!(
                "│   retries:   {:<48}│",
                format!("{} x {}ms", target.retry_attempts, target.retry_delay_ms)
            );
            println!("│   timeout:   {:<48}│", format!("{}ms", target.publish_timeout_ms));
        }
        println!("└──────────────────────────────────────────────────────────────┘\n");
    }
}
