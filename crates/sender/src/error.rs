//! Sender error types

use thiserror::Error;

use contracts::{BackendError, ContractError, HandlerError};
use publisher::PublishError;

/// Errors raised while wiring or running the sender
///
/// Per-message failures never surface to callers; they end up in logs,
/// metrics and the message status. This type covers wiring mistakes and
/// the internal results the worker logs.
#[derive(Debug, Error)]
pub enum SenderError {
    /// Scheduler was started twice
    #[error("scheduler already started")]
    AlreadyStarted,

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}
