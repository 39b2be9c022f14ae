//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{GatewayConfig, TransportKind};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    max_workers: usize,
    wait_media_channels: Vec<String>,
    publisher_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    max_workers: config.sender.max_workers,
                    wait_media_channels: config
                        .sender
                        .wait_media_channels
                        .iter()
                        .map(|c| c.to_string())
                        .collect(),
                    publisher_count: config.side_channel.publishers.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &GatewayConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.sender.max_workers == 0 {
        warnings.push("sender.max_workers is 0 - no messages will be sent".to_string());
    }

    if config.side_channel.publishers.is_empty() {
        warnings.push(
            "No side-channel publishers configured - billing/template events will be dropped"
                .to_string(),
        );
    }

    for target in &config.side_channel.publishers {
        if target.transport == TransportKind::Log {
            warnings.push(format!(
                "Publisher '{}' only logs events - nothing reaches a broker",
                target.name
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Workers: {}", summary.max_workers);
            if !summary.wait_media_channels.is_empty() {
                println!("  Ordering wait: {}", summary.wait_media_channels.join(", "));
            }
            println!("  Publishers: {}", summary.publisher_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn args_for(content: &str) -> (ValidateArgs, NamedTempFile) {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };
        (args, file)
    }

    #[test]
    fn test_valid_config_with_warnings() {
        let (args, _file) = args_for("[sender]\nmax_workers = 0\n");
        let result = validate_config(&args);

        assert!(result.valid);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("max_workers is 0")));
        assert!(warnings.iter().any(|w| w.contains("No side-channel publishers")));
    }

    #[test]
    fn test_invalid_config() {
        let (args, _file) = args_for(
            "[[side_channel.publishers]]\nname = \"a\"\ntransport = \"redis\"\nurl = \"http://x\"\n",
        );
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.is_some());
    }
}
