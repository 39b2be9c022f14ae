//! Transport implementations
//!
//! Contains RedisTransport, LogTransport, and MemoryTransport.

mod log;
mod memory;
mod redis;

pub use self::log::LogTransport;
pub use self::memory::{MemoryBroker, MemoryTransport};
pub use self::redis::RedisTransport;
