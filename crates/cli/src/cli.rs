//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Gateway - outgoing message dispatch engine
#[derive(Parser, Debug)]
#[command(
    name = "gateway",
    author,
    version,
    about = "Outgoing message dispatch engine",
    long_about = "Pulls queued outbound messages, dispatches them to messaging vendors \n\
                  through channel handlers and publishes billing/template events to \n\
                  the configured side-channel brokers."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "GATEWAY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "GATEWAY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the dispatch engine
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "gateway.toml", env = "GATEWAY_CONFIG")]
    pub config: PathBuf,

    /// JSON file with messages to queue in the in-memory backend
    #[arg(short, long, env = "GATEWAY_FIXTURE")]
    pub fixture: Option<PathBuf>,

    /// Override the worker count from configuration
    #[arg(long, env = "GATEWAY_MAX_WORKERS")]
    pub max_workers: Option<usize>,

    /// Simulated vendor latency in milliseconds
    #[arg(long, default_value = "0", env = "GATEWAY_VENDOR_LATENCY_MS")]
    pub vendor_latency_ms: u64,

    /// Run timeout in seconds (0 = until drained or interrupted)
    #[arg(long, default_value = "0", env = "GATEWAY_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and fixture, then exit
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = use configuration)
    #[arg(long, default_value = "0", env = "GATEWAY_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "gateway.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "gateway.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show side-channel publisher targets
    #[arg(long)]
    pub publishers: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for contracts::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_args() {
        let cli = Cli::try_parse_from([
            "gateway",
            "-v",
            "run",
            "--config",
            "gw.toml",
            "--fixture",
            "msgs.json",
            "--max-workers",
            "4",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.config, PathBuf::from("gw.toml"));
                assert_eq!(args.fixture, Some(PathBuf::from("msgs.json")));
                assert_eq!(args.max_workers, Some(4));
                assert_eq!(args.timeout, 0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["gateway", "-q", "-v", "validate"]);
        assert!(result.is_err());
    }
}
