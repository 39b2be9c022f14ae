//! ChannelLog - HTTP exchange records attached to statuses

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ChannelUuid, HandlerError, MsgId};

/// What the logged exchange was for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelLogType {
    MsgSend,
    MsgAction,
    MsgLoop,
}

/// Error recorded against an exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelError {
    pub code: String,
    pub message: String,
}

/// One vendor HTTP exchange (or a synthetic entry when none happened)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelLog {
    pub uuid: Uuid,
    pub log_type: ChannelLogType,
    pub channel_uuid: ChannelUuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<MsgId>,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub request: String,
    #[serde(default)]
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ChannelError>,
    pub created_on: DateTime<Utc>,
}

impl ChannelLog {
    /// Empty log entry of the given type
    pub fn new(log_type: ChannelLogType, channel_uuid: ChannelUuid, msg_id: Option<MsgId>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            log_type,
            channel_uuid,
            msg_id,
            method: String::new(),
            url: String::new(),
            request: String::new(),
            response: String::new(),
            status_code: None,
            elapsed: Duration::ZERO,
            error: None,
            created_on: Utc::now(),
        }
    }

    /// Record the HTTP exchange
    pub fn with_exchange(
        mut self,
        method: impl Into<String>,
        url: impl Into<String>,
        status_code: u16,
        elapsed: Duration,
    ) -> Self {
        self.method = method.into();
        self.url = url.into();
        self.status_code = Some(status_code);
        self.elapsed = elapsed;
        self
    }

    /// Record an error
    pub fn with_error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.error = Some(ChannelError {
            code: code.into(),
            message: message.into(),
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Collects the channel logs of a single dispatch
///
/// Handed mutably to handlers; drained into the final status by the worker.
#[derive(Debug)]
pub struct ChannelLogger {
    log_type: ChannelLogType,
    channel_uuid: ChannelUuid,
    msg_id: Option<MsgId>,
    logs: Vec<ChannelLog>,
}

impl ChannelLogger {
    pub fn new(log_type: ChannelLogType, channel_uuid: ChannelUuid, msg_id: Option<MsgId>) -> Self {
        Self {
            log_type,
            channel_uuid,
            msg_id,
            logs: Vec::new(),
        }
    }

    /// Start a blank entry bound to this dispatch
    pub fn entry(&self) -> ChannelLog {
        ChannelLog::new(self.log_type, self.channel_uuid, self.msg_id)
    }

    /// Record a finished entry
    pub fn record(&mut self, log: ChannelLog) {
        self.logs.push(log);
    }

    /// Record a synthetic error entry
    pub fn error(&mut self, code: impl Into<String>, message: impl Into<String>) {
        let log = self.entry().with_error(code, message);
        self.logs.push(log);
    }

    /// Record a handler error as a synthetic entry
    pub fn handler_error(&mut self, err: &HandlerError) {
        self.error(err.code().to_string(), err.to_string());
    }

    /// Whether any recorded entry carries an error
    pub fn has_error(&self) -> bool {
        self.logs.iter().any(ChannelLog::is_error)
    }

    /// Switch the type used for subsequent entries
    pub fn set_log_type(&mut self, log_type: ChannelLogType) {
        self.log_type = log_type;
    }

    pub fn logs(&self) -> &[ChannelLog] {
        &self.logs
    }

    pub fn into_logs(self) -> Vec<ChannelLog> {
        self.logs
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_error_tracking() {
        let mut logger = ChannelLogger::new(ChannelLogType::MsgSend, Uuid::new_v4(), Some(MsgId(1)));
        assert!(!logger.has_error());

        let ok = logger
            .entry()
            .with_exchange("POST", "https://graph.facebook.com/v18.0/messages", 200, Duration::from_millis(120));
        logger.record(ok);
        assert!(!logger.has_error());

        logger.handler_error(&HandlerError::Timeout(Duration::from_secs(35)));
        assert!(logger.has_error());

        let logs = logger.into_logs();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[1].error.as_ref().unwrap().code, "timeout");
        assert_eq!(logs[1].msg_id, Some(MsgId(1)));
    }

    #[test]
    fn test_elapsed_serialized_as_millis() {
        let log = ChannelLog::new(ChannelLogType::MsgSend, Uuid::new_v4(), None)
            .with_exchange("POST", "https://api.telegram.org/sendMessage", 200, Duration::from_millis(42));
        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["elapsed"], 42);
        assert_eq!(json["log_type"], "msg_send");
    }
}
