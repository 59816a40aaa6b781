//! Pick-up match lifecycle
//!
//! The [`MatchOrchestrator`] owns the phase machine and every piece of
//! per-match state. Events go in through [`MatchOrchestrator::handle`],
//! virtual time goes in through [`MatchOrchestrator::advance`], and both
//! return the [`Effect`]s the runtime must carry out.

pub mod actions;
pub mod commands;
pub mod decider;
pub mod effects;
pub mod events;
pub mod orchestrator;
pub mod phase;
pub mod recovery;
pub mod timings;

pub use actions::ScheduledAction;
pub use commands::{Command, CommandRegistry};
pub use decider::{decider_for, BotDecider, Decider, Decision, HumanDecider};
pub use effects::{Effect, EngineCommand, MapOption, Menu, Notice, CONFIG_DIR};
pub use events::{MatchEvent, MenuSelection};
pub use orchestrator::{MatchOrchestrator, MatchStatus, OrchestratorStats, TeamChangeVerdict};
pub use phase::MatchPhase;
pub use recovery::{DisconnectRecovery, RecoveryInput, RecoveryPlan, RepairIntent};
