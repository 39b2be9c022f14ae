//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the gateway.
//! Business crates depend only on this crate, never on each other's internals.
//!
//! ## Collaborators
//! - [`Backend`]: queue + database, supplies messages and persists outcomes
//! - [`ChannelHandler`]: vendor protocol plugin, performs the actual send

mod backend;
mod channel_log;
mod channel_type;
mod config;
mod envelope;
mod error;
mod handler;
mod message;
mod status;

pub use backend::*;
pub use channel_log::*;
pub use channel_type::ChannelType;
pub use config::*;
pub use envelope::*;
pub use error::*;
pub use handler::*;
pub use message::*;
pub use status::*;
