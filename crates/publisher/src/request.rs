//! PublishRequest - one envelope bound for the broker, plus its hooks

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::warn;

use crate::error::PublishError;
use crate::metrics::PublisherMetrics;

/// Callback run around a publish attempt
///
/// Shared so the composite publisher can run it once per target.
pub type Hook = Arc<dyn Fn() + Send + Sync>;

/// Encoded envelope with routing information
#[derive(Clone)]
pub struct PublishRequest {
    pub routing_key: String,
    pub payload: Bytes,
    /// Runs right before the first attempt
    pub pre_hook: Option<Hook>,
    /// Runs once the request is delivered or abandoned
    pub post_hook: Option<Hook>,
}

impl PublishRequest {
    /// Encode `envelope` as JSON
    pub fn json<T: Serialize>(envelope: &T, routing_key: impl Into<String>) -> Result<Self, PublishError> {
        let payload = serde_json::to_vec(envelope)?;
        Ok(Self {
            routing_key: routing_key.into(),
            payload: Bytes::from(payload),
            pre_hook: None,
            post_hook: None,
        })
    }

    pub fn with_pre_hook(mut self, hook: Hook) -> Self {
        self.pre_hook = Some(hook);
        self
    }

    pub fn with_post_hook(mut self, hook: Hook) -> Self {
        self.post_hook = Some(hook);
        self
    }
}

impl fmt::Debug for PublishRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishRequest")
            .field("routing_key", &self.routing_key)
            .field("payload_len", &self.payload.len())
            .field("pre_hook", &self.pre_hook.is_some())
            .field("post_hook", &self.post_hook.is_some())
            .finish()
    }
}

/// Run a hook, swallowing any panic it raises
///
/// Returns false when the hook panicked.
pub(crate) fn run_hook(
    target: &str,
    stage: &'static str,
    hook: Option<&Hook>,
    metrics: &PublisherMetrics,
) -> bool {
    let Some(hook) = hook else {
        return true;
    };

    match catch_unwind(AssertUnwindSafe(|| hook())) {
        Ok(()) => true,
        Err(panic) => {
            metrics.inc_hook_panic_count();
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(target_name = %target, stage, reason = %reason, "Publish hook panicked, ignoring");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_json_request() {
        let request = PublishRequest::json(&serde_json::json!({"a": 1}), "billing").unwrap();
        assert_eq!(request.routing_key, "billing");
        assert_eq!(&request.payload[..], br#"{"a":1}"#);
    }

    #[test]
    fn test_run_hook_ok() {
        let metrics = PublisherMetrics::new();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let hook: Hook = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(run_hook("t", "pre", Some(&hook), &metrics));
        assert!(run_hook("t", "pre", None, &metrics));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.hook_panic_count(), 0);
    }

    #[test]
    fn test_run_hook_panic_is_contained() {
        let metrics = PublisherMetrics::new();
        let hook: Hook = Arc::new(|| panic!("boom"));

        assert!(!run_hook("t", "post", Some(&hook), &metrics));
        assert_eq!(metrics.hook_panic_count(), 1);
    }
}
