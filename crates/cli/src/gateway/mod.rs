//! Engine wiring and run lifecycle.

mod fixture;
mod orchestrator;
mod stats;

pub use fixture::Fixture;
pub use orchestrator::{Gateway, GatewayRunConfig};
pub use stats::RunStats;
