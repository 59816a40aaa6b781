//! MixScrims - pick-up match lifecycle orchestrator
//!
//! This crate drives a 5v5 pick-up match from warmup to the final reset:
//! readiness, map voting, captain drafting, the knife round, side choice,
//! team timeouts and disconnect repair. The core is a synchronous,
//! deterministic [`MatchOrchestrator`]; an AMQP bridge feeds it game events
//! and publishes the effects it produces.

pub mod amqp;
pub mod config;
pub mod error;
pub mod match_flow;
pub mod metrics;
pub mod notify;
pub mod players;
pub mod roster;
pub mod scheduler;
pub mod service;
pub mod timeout;
pub mod types;
pub mod utils;
pub mod voting;

// Re-export commonly used types and traits
pub use error::{MatchError, MatchResult, Result};
pub use types::*;

// Re-export key components
pub use amqp::publisher::EffectPublisher;
pub use match_flow::{Effect, MatchEvent, MatchOrchestrator, MatchPhase};
pub use players::{InMemoryPlayerDirectory, PlayerDirectory};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
