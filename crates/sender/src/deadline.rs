//! Deadlines for backend calls

use std::future::Future;
use std::time::Duration;

use contracts::{BackendError, BackendResult};

/// Run a backend call under `limit`
///
/// A missed deadline is reported as an ordinary [`BackendError::Timeout`].
pub(crate) async fn within<T>(
    operation: &'static str,
    limit: Duration,
    call: impl Future<Output = BackendResult<T>>,
) -> BackendResult<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::timeout(operation, limit)),
    }
}
