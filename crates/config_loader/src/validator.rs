//! 配置校验模块
//!
//! 校验规则：
//! - 配置类型上声明的字段范围 (`validator` derive)
//! - publisher name 唯一
//! - redis 目标必须配置 `redis://` 或 `rediss://` url
//! - 设置等待通道列表时 wait_media_count >= 1
//! - billing 与 template 路由键不同

use std::collections::HashSet;

use ::validator::Validate;
use contracts::{ContractError, GatewayConfig, TransportKind};

/// 校验 GatewayConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &GatewayConfig) -> Result<(), ContractError> {
    validate_fields(config)?;
    validate_publisher_names(config)?;
    validate_publisher_urls(config)?;
    validate_wait_media(config)?;
    validate_routing_keys(config)?;
    Ok(())
}

/// 校验类型上声明的范围与长度规则
fn validate_fields(config: &GatewayConfig) -> Result<(), ContractError> {
    config.validate().map_err(|errors| {
        let field = errors
            .errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "config".to_string());
        ContractError::config_validation(field, errors.to_string())
    })
}

/// 校验 publisher name 唯一性
fn validate_publisher_names(config: &GatewayConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for publisher in &config.side_channel.publishers {
        if !seen.insert(publisher.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("side_channel.publishers[name={}]", publisher.name),
                "duplicate publisher name",
            ));
        }
    }
    Ok(())
}

/// 校验 redis 目标 url
fn validate_publisher_urls(config: &GatewayConfig) -> Result<(), ContractError> {
    for publisher in &config.side_channel.publishers {
        if publisher.transport != TransportKind::Redis {
            continue;
        }
        let field = format!("side_channel.publishers[{}].url", publisher.name);
        match publisher.url.as_deref() {
            None | Some("") => {
                return Err(ContractError::config_validation(
                    field,
                    "url is required for redis transport",
                ));
            }
            Some(url) if !(url.starts_with("redis://") || url.starts_with("rediss://")) => {
                return Err(ContractError::config_validation(
                    field,
                    format!("url '{url}' must use the redis:// or rediss:// scheme"),
                ));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// 校验等待通道配置
fn validate_wait_media(config: &GatewayConfig) -> Result<(), ContractError> {
    let sender = &config.sender;
    if !sender.wait_media_channels.is_empty() && sender.wait_media_count == 0 {
        return Err(ContractError::config_validation(
            "sender.wait_media_count",
            "wait_media_count must be >= 1 when wait_media_channels is set",
        ));
    }
    Ok(())
}

/// 校验路由键
fn validate_routing_keys(config: &GatewayConfig) -> Result<(), ContractError> {
    let side = &config.side_channel;
    if side.billing_routing_key == side.template_routing_key {
        return Err(ContractError::config_validation(
            "side_channel.template_routing_key",
            format!(
                "template_routing_key must differ from billing_routing_key ('{}')",
                side.billing_routing_key
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{PublisherTargetConfig, SenderSettings, SideChannelSettings};

    fn minimal_config() -> GatewayConfig {
        GatewayConfig {
            sender: SenderSettings {
                max_workers: 4,
                wait_media_channels: vec!["WAC".into()],
                ..Default::default()
            },
            side_channel: SideChannelSettings {
                publishers: vec![PublisherTargetConfig {
                    name: "billing".into(),
                    transport: TransportKind::Redis,
                    url: Some("redis://localhost:6379".into()),
                    stream: "gateway.events".into(),
                    retry_attempts: 3,
                    retry_delay_ms: 1000,
                    publish_timeout_ms: 5000,
                    queue_capacity: 100,
                }],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config() {
        let config = minimal_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_workers_is_valid() {
        let mut config = minimal_config();
        config.sender.max_workers = 0;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_duplicate_publisher_name() {
        let mut config = minimal_config();
        let dup = config.side_channel.publishers[0].clone();
        config.side_channel.publishers.push(dup);
        let result = validate(&config);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("duplicate publisher name"), "got: {err}");
    }

    #[test]
    fn test_redis_requires_url() {
        let mut config = minimal_config();
        config.side_channel.publishers[0].url = None;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("url is required"), "got: {err}");
    }

    #[test]
    fn test_redis_url_scheme() {
        let mut config = minimal_config();
        config.side_channel.publishers[0].url = Some("amqp://localhost".into());
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("redis://"), "got: {err}");
    }

    #[test]
    fn test_zero_retry_attempts() {
        let mut config = minimal_config();
        config.side_channel.publishers[0].retry_attempts = 0;
        let result = validate(&config);
        assert!(matches!(result, Err(ContractError::ConfigValidation { .. })));
    }

    #[test]
    fn test_wait_media_count_zero() {
        let mut config = minimal_config();
        config.sender.wait_media_count = 0;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("wait_media_count"), "got: {err}");
    }

    #[test]
    fn test_same_routing_keys() {
        let mut config = minimal_config();
        config.side_channel.template_routing_key = "billing".into();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("must differ"), "got: {err}");
    }
}
