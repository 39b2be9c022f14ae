//! Layered error definitions
//!
//! Categorized by source: config / registry / backend / handler

use std::time::Duration;

use thiserror::Error;

use crate::ChannelType;

/// Unified error type for configuration and wiring
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Registry Errors =====
    /// A handler was registered twice for the same channel type
    #[error("handler already registered for channel type '{channel_type}'")]
    DuplicateHandler { channel_type: ChannelType },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by a [`Backend`](crate::Backend) implementation
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The call exceeded its deadline
    #[error("backend call '{operation}' timed out after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },

    /// Queue or database not reachable
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Requested record does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Anything else
    #[error("backend error: {0}")]
    Other(String),
}

impl BackendError {
    /// Create a timeout error for a named operation
    pub fn timeout(operation: &'static str, elapsed: Duration) -> Self {
        Self::Timeout { operation, elapsed }
    }
}

/// Errors raised by channel handlers while dispatching
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// The handler does not implement the action capability
    #[error("channel type '{channel_type}' does not support actions")]
    ActionsUnsupported { channel_type: ChannelType },

    /// No handler registered for the message's channel type
    #[error("no handler registered for channel type '{channel_type}'")]
    NoHandler { channel_type: ChannelType },

    /// Vendor call exceeded its deadline
    #[error("dispatch timed out after {0:?}")]
    Timeout(Duration),

    /// Vendor rejected the request or returned an unexpected response
    #[error("vendor error{}: {message}", code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default())]
    Vendor {
        code: Option<String>,
        message: String,
    },

    /// Transport level failure (connection refused, TLS, DNS, ...)
    #[error("connection error: {0}")]
    Connection(String),
}

impl HandlerError {
    /// Create a vendor error without a code
    pub fn vendor(message: impl Into<String>) -> Self {
        Self::Vendor {
            code: None,
            message: message.into(),
        }
    }

    /// Create a vendor error with a vendor-specific code
    pub fn vendor_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Vendor {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Short machine readable code for channel log errors
    pub fn code(&self) -> &str {
        match self {
            Self::ActionsUnsupported { .. } => "actions_unsupported",
            Self::NoHandler { .. } => "no_handler",
            Self::Timeout(_) => "timeout",
            Self::Vendor { code, .. } => code.as_deref().unwrap_or("vendor_error"),
            Self::Connection(_) => "connection_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actions_unsupported_message() {
        let err = HandlerError::ActionsUnsupported {
            channel_type: "TG".into(),
        };
        assert_eq!(
            err.to_string(),
            "channel type 'TG' does not support actions"
        );
    }

    #[test]
    fn test_vendor_error_code() {
        let err = HandlerError::vendor_code("131047", "re-engagement window closed");
        assert_eq!(err.code(), "131047");
        assert!(err.to_string().contains("[131047]"));

        let err = HandlerError::vendor("bad response");
        assert_eq!(err.code(), "vendor_error");
        assert_eq!(err.to_string(), "vendor error: bad response");
    }
}
