//! # Sender
//!
//! Outgoing message dispatch engine.
//!
//! Responsibilities:
//! - Pull queued messages from the backend with a fixed worker pool
//! - Skip duplicates and looping messages
//! - Keep per-contact ordering for channels that need it
//! - Dispatch through the registered vendor handler
//! - Publish billing/template events and persist the outcome

mod deadline;

pub mod barrier;
pub mod error;
pub mod fanout;
pub mod mock;
pub mod registry;
pub mod scheduler;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use barrier::{BarrierOutcome, OrderingBarrier};
pub use error::SenderError;
pub use fanout::{FanoutReport, SideChannel};
pub use mock::{BackendCalls, MemoryBackend, Scripted, ScriptedHandler};
pub use registry::HandlerRegistry;
pub use scheduler::Scheduler;
pub use worker::{DispatchOutcome, MsgDispatcher};

pub use tokio_util::task::TaskTracker;
