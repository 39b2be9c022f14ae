//! GatewayConfig - Config Loader output
//!
//! Sender pool tuning, side-channel publisher targets and observability
//! settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ChannelType;

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct GatewayConfig {
    #[serde(default)]
    pub version: ConfigVersion,

    #[serde(default)]
    #[validate(nested)]
    pub sender: SenderSettings,

    #[serde(default)]
    #[validate(nested)]
    pub side_channel: SideChannelSettings,

    #[serde(default)]
    pub observability: ObservabilitySettings,
}

/// Worker pool and timing settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SenderSettings {
    /// Number of workers, 0 disables sending
    #[serde(default = "default_max_workers")]
    #[validate(range(max = 1024))]
    pub max_workers: usize,

    /// Channel types whose messages wait for the contact's previous message
    #[serde(default)]
    pub wait_media_channels: Vec<ChannelType>,

    /// Maximum ordering lookups before dispatching anyway
    #[serde(default = "default_wait_media_count")]
    pub wait_media_count: u32,

    /// Pause between ordering lookups
    #[serde(default = "default_wait_media_sleep_ms")]
    #[validate(range(min = 1))]
    pub wait_media_sleep_ms: u64,

    #[serde(default = "default_poll_timeout_secs")]
    #[validate(range(min = 1))]
    pub poll_timeout_secs: u64,

    /// Pause after an empty or failed poll
    #[serde(default = "default_idle_sleep_ms")]
    #[validate(range(min = 1))]
    pub idle_sleep_ms: u64,

    #[serde(default = "default_send_timeout_secs")]
    #[validate(range(min = 1))]
    pub send_timeout_secs: u64,

    #[serde(default = "default_action_timeout_secs")]
    #[validate(range(min = 1))]
    pub action_timeout_secs: u64,

    #[serde(default = "default_backend_timeout_secs")]
    #[validate(range(min = 1))]
    pub backend_timeout_secs: u64,

    #[serde(default = "default_finalize_timeout_secs")]
    #[validate(range(min = 1))]
    pub finalize_timeout_secs: u64,
}

impl Default for SenderSettings {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            wait_media_channels: Vec::new(),
            wait_media_count: default_wait_media_count(),
            wait_media_sleep_ms: default_wait_media_sleep_ms(),
            poll_timeout_secs: default_poll_timeout_secs(),
            idle_sleep_ms: default_idle_sleep_ms(),
            send_timeout_secs: default_send_timeout_secs(),
            action_timeout_secs: default_action_timeout_secs(),
            backend_timeout_secs: default_backend_timeout_secs(),
            finalize_timeout_secs: default_finalize_timeout_secs(),
        }
    }
}

impl SenderSettings {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    pub fn finalize_timeout(&self) -> Duration {
        Duration::from_secs(self.finalize_timeout_secs)
    }

    pub fn wait_media_sleep(&self) -> Duration {
        Duration::from_millis(self.wait_media_sleep_ms)
    }

    /// Whether messages of this channel type go through the ordering barrier
    pub fn waits_for_media(&self, channel_type: &ChannelType) -> bool {
        self.wait_media_channels.contains(channel_type)
    }
}

fn default_max_workers() -> usize {
    32
}

fn default_wait_media_count() -> u32 {
    10
}

fn default_wait_media_sleep_ms() -> u64 {
    1000
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_idle_sleep_ms() -> u64 {
    250
}

fn default_send_timeout_secs() -> u64 {
    35
}

fn default_action_timeout_secs() -> u64 {
    20
}

fn default_backend_timeout_secs() -> u64 {
    30
}

fn default_finalize_timeout_secs() -> u64 {
    15
}

/// Side-channel publishing settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SideChannelSettings {
    #[serde(default = "default_billing_routing_key")]
    #[validate(length(min = 1))]
    pub billing_routing_key: String,

    #[serde(default = "default_template_routing_key")]
    #[validate(length(min = 1))]
    pub template_routing_key: String,

    /// Broker targets, every envelope is sent to all of them
    #[serde(default)]
    #[validate(nested)]
    pub publishers: Vec<PublisherTargetConfig>,
}

impl Default for SideChannelSettings {
    fn default() -> Self {
        Self {
            billing_routing_key: default_billing_routing_key(),
            template_routing_key: default_template_routing_key(),
            publishers: Vec::new(),
        }
    }
}

fn default_billing_routing_key() -> String {
    "billing".to_string()
}

fn default_template_routing_key() -> String {
    "template".to_string()
}

/// One broker target
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PublisherTargetConfig {
    #[validate(length(min = 1))]
    pub name: String,

    pub transport: TransportKind,

    /// Broker URL (required for redis)
    #[serde(default)]
    pub url: Option<String>,

    /// Stream / exchange name
    #[serde(default = "default_stream")]
    #[validate(length(min = 1))]
    pub stream: String,

    #[serde(default = "default_retry_attempts")]
    #[validate(range(min = 1, max = 100))]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Deadline for one connect + publish attempt
    #[serde(default = "default_publish_timeout_ms")]
    #[validate(range(min = 1))]
    pub publish_timeout_ms: u64,

    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,
}

impl PublisherTargetConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

fn default_stream() -> String {
    "gateway.events".to_string()
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_publish_timeout_ms() -> u64 {
    5000
}

fn default_queue_capacity() -> usize {
    1000
}

/// Transport type of a publisher target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Redis stream (XADD)
    Redis,
    /// Log only
    Log,
}

/// Logging and metrics settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    #[serde(default)]
    pub log_format: LogFormat,

    /// Prometheus port (None = disabled)
    #[serde(default)]
    pub metrics_port: Option<u16>,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            metrics_port: None,
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// JSON structured logs
    #[default]
    Json,
    /// Human readable
    Pretty,
    /// Single line
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_defaults() {
        let settings = SenderSettings::default();
        assert_eq!(settings.max_workers, 32);
        assert_eq!(settings.poll_timeout(), Duration::from_secs(30));
        assert_eq!(settings.idle_sleep(), Duration::from_millis(250));
        assert_eq!(settings.send_timeout(), Duration::from_secs(35));
        assert_eq!(settings.action_timeout(), Duration::from_secs(20));
        assert_eq!(settings.finalize_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_waits_for_media() {
        let settings = SenderSettings {
            wait_media_channels: vec!["wac".into()],
            ..Default::default()
        };
        assert!(settings.waits_for_media(&"WAC".into()));
        assert!(!settings.waits_for_media(&"TG".into()));
    }

    #[test]
    fn test_derive_validation_rejects_zero_retries() {
        let target = PublisherTargetConfig {
            name: "billing".into(),
            transport: TransportKind::Log,
            url: None,
            stream: "events".into(),
            retry_attempts: 0,
            retry_delay_ms: 10,
            publish_timeout_ms: 1000,
            queue_capacity: 10,
        };
        assert!(target.validate().is_err());
    }
}
