//! Service layer for the mix-scrims orchestrator
//!
//! Application state, the AMQP bridge into the orchestrator, effect routing
//! and background task management.

pub mod app;
pub mod health;

pub use app::{AppState, EffectRouter, MatchBridge};
pub use health::{HealthCheck, HealthStatus, HealthTarget, SharedOrchestrator};
