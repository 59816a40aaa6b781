//! Error types for the match orchestrator
//!
//! Service plumbing uses anyhow for propagation; rejections of player and
//! admin actions use the typed `MatchError` so callers can tell them apart.

use crate::match_flow::MatchPhase;
use crate::types::{PlayerId, Team};

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Result of a command or decision handled by the orchestrator
pub type MatchResult<T> = std::result::Result<T, MatchError>;

/// Rejections and failures surfaced by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("'{action}' is not available during {phase}")]
    InvalidState { action: String, phase: MatchPhase },

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Unknown command: {name}")]
    UnknownCommand { name: String },

    #[error("Missing permission '{permission}' for command '{command}'")]
    PermissionDenied { command: String, permission: String },

    #[error("Player not found: {player_id}")]
    PlayerNotFound { player_id: PlayerId },

    #[error("Only the {team} captain can do that")]
    NotCaptain { team: Team },

    #[error("Not your turn to pick")]
    NotYourTurn,

    #[error("Starting side was already chosen")]
    AlreadyDecided,

    #[error("Team {team} has no timeouts left")]
    NoTimeoutsLeft { team: Team },

    #[error("Team {team} already has a timeout pending")]
    TimeoutPending { team: Team },

    #[error("A timeout vote is already in progress")]
    VoteInProgress,

    #[error("No vote is open")]
    NoVoteOpen,

    #[error("Player {player_id} already voted")]
    AlreadyVoted { player_id: PlayerId },

    #[error("Captain slot for {team} is already taken")]
    CaptainSlotTaken { team: Team },

    #[error("Captain selection failed: {reason}")]
    SelectionFailed { reason: String },

    #[error("Invite is on cooldown for another {remaining}")]
    InviteCooldown { remaining: String },

    #[error("Misconfiguration: {message}")]
    Misconfiguration { message: String },
}

impl MatchError {
    pub fn invalid_state(action: impl Into<String>, phase: MatchPhase) -> Self {
        MatchError::InvalidState {
            action: action.into(),
            phase,
        }
    }

    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        MatchError::InvalidArgument {
            reason: reason.into(),
        }
    }
}

/// Failures raised by the service runtime around the orchestrator
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("AMQP connection failed: {message}")]
    AmqpConnection { message: String },

    #[error("Service initialization failed: {message}")]
    Initialization { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Background task failed: {message}")]
    BackgroundTask { message: String },

    #[error("Webhook delivery failed: {message}")]
    WebhookDelivery { message: String },

    #[error("Invalid bridge message: {reason}")]
    InvalidMessage { reason: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}
