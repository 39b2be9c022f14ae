//! Publisher error types

use std::time::Duration;

use thiserror::Error;

/// Publisher-specific errors
#[derive(Debug, Error)]
pub enum PublishError {
    /// Target could not be created from configuration
    #[error("failed to create publisher target '{target}': {message}")]
    Config { target: String, message: String },

    /// Could not (re)connect to the broker
    #[error("target '{target}' connection error: {message}")]
    Connect { target: String, message: String },

    /// Broker rejected the publish or the connection broke mid-flight
    #[error("target '{target}' publish error: {message}")]
    Publish {
        target: String,
        message: String,
        /// The connection is gone and must be re-established
        connection_dropped: bool,
    },

    /// Connect + publish attempt exceeded its deadline
    #[error("target '{target}' attempt timed out after {elapsed:?}")]
    Timeout { target: String, elapsed: Duration },

    /// Envelope could not be encoded
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PublishError {
    pub fn config(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn connect(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connect {
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn publish(
        target: impl Into<String>,
        message: impl Into<String>,
        connection_dropped: bool,
    ) -> Self {
        Self::Publish {
            target: target.into(),
            message: message.into(),
            connection_dropped,
        }
    }

    pub fn timeout(target: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout {
            target: target.into(),
            elapsed,
        }
    }

    /// Whether a reconnect is needed before the next attempt
    pub fn connection_dropped(&self) -> bool {
        match self {
            Self::Connect { .. } | Self::Timeout { .. } => true,
            Self::Publish {
                connection_dropped, ..
            } => *connection_dropped,
            _ => false,
        }
    }
}
