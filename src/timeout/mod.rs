//! Team timeouts: budgets, votes, pending and queued requests

pub mod coordinator;
pub mod vote;

pub use coordinator::{TimeoutCoordinator, TimeoutRequest, TimeoutStart};
pub use vote::{TimeoutVote, VoteOutcome};
