//! Timeout budgets and request sequencing
//!
//! The coordinator only tracks state. Pausing, announcing and the timers that
//! end a timeout belong to the orchestrator.

use crate::error::{MatchError, MatchResult};
use crate::timeout::vote::{TimeoutVote, VoteOutcome};
use crate::types::{Ballot, PlayerId, PlayerRef, Team};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info};

/// What a timeout request turned into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeoutRequest {
    /// A team vote was opened
    VoteStarted { vote_id: u64 },
    /// A timeout is running; the team was queued behind it
    Queued { position: usize },
    /// The team was already queued
    AlreadyQueued,
}

/// Result of trying to start a team's timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeoutStart {
    Started { team: Team, remaining: u32 },
    Queued { team: Team },
    /// The team ran out of budget while waiting in the queue
    Exhausted { team: Team },
}

/// Per-team budgets plus pending, queued, active and voting state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutCoordinator {
    max_per_team: u32,
    remaining_ct: u32,
    remaining_t: u32,
    pending: Option<Team>,
    queue: VecDeque<Team>,
    active: Option<Team>,
    vote: Option<TimeoutVote>,
    next_vote_id: u64,
}

impl TimeoutCoordinator {
    pub fn new(max_per_team: u32) -> Self {
        Self {
            max_per_team,
            remaining_ct: max_per_team,
            remaining_t: max_per_team,
            pending: None,
            queue: VecDeque::new(),
            active: None,
            vote: None,
            next_vote_id: 0,
        }
    }

    /// Restore full budgets and drop all requests
    pub fn reset(&mut self) {
        let next_vote_id = self.next_vote_id;
        *self = Self::new(self.max_per_team);
        self.next_vote_id = next_vote_id;
    }

    pub fn max_per_team(&self) -> u32 {
        self.max_per_team
    }

    pub fn remaining(&self, team: Team) -> u32 {
        match team {
            Team::CT => self.remaining_ct,
            Team::T => self.remaining_t,
            Team::Spectator => 0,
        }
    }

    pub fn pending(&self) -> Option<Team> {
        self.pending
    }

    pub fn active(&self) -> Option<Team> {
        self.active
    }

    pub fn queued(&self) -> impl Iterator<Item = Team> + '_ {
        self.queue.iter().copied()
    }

    pub fn vote(&self) -> Option<&TimeoutVote> {
        self.vote.as_ref()
    }

    /// Handle a request from `caller` on `team`.
    ///
    /// While a timeout runs the request is queued, and its budget is checked
    /// when it is dequeued. Otherwise the budget is checked, any approved
    /// timeout still waiting for freeze time blocks the request, and a vote
    /// among `teammates` is opened.
    pub fn request(
        &mut self,
        team: Team,
        caller: PlayerRef,
        teammates: Vec<PlayerId>,
    ) -> MatchResult<TimeoutRequest> {
        if !team.is_playing() {
            return Err(MatchError::invalid_argument(
                "only players on a team can call a timeout",
            ));
        }

        if self.active.is_some() {
            if self.queue.contains(&team) {
                return Ok(TimeoutRequest::AlreadyQueued);
            }
            self.queue.push_back(team);
            info!(
                "Timeout queued - team: {}, caller: '{}', position: {}",
                team,
                caller.name,
                self.queue.len()
            );
            return Ok(TimeoutRequest::Queued {
                position: self.queue.len(),
            });
        }

        if self.remaining(team) == 0 {
            return Err(MatchError::NoTimeoutsLeft { team });
        }
        if let Some(pending) = self.pending {
            return Err(MatchError::TimeoutPending { team: pending });
        }
        if self.queue.contains(&team) {
            return Err(MatchError::TimeoutPending { team });
        }
        if self.vote.is_some() {
            return Err(MatchError::VoteInProgress);
        }

        self.next_vote_id += 1;
        let vote_id = self.next_vote_id;
        info!(
            "Timeout vote opened - id: {}, team: {}, caller: '{}', voters: {}",
            vote_id,
            team,
            caller.name,
            teammates.len().saturating_sub(1)
        );
        self.vote = Some(TimeoutVote::new(vote_id, team, caller, teammates));
        Ok(TimeoutRequest::VoteStarted { vote_id })
    }

    /// Record a ballot. Returns the outcome once every eligible ballot is in.
    pub fn cast(&mut self, voter: PlayerId, ballot: Ballot) -> MatchResult<Option<VoteOutcome>> {
        let vote = self.vote.as_mut().ok_or(MatchError::NoVoteOpen)?;
        vote.cast(voter, ballot)?;
        if vote.is_complete() {
            return Ok(self.conclude_vote());
        }
        Ok(None)
    }

    /// Close the vote early if it is already complete, e.g. with no teammates
    pub fn conclude_if_complete(&mut self) -> Option<VoteOutcome> {
        if self.vote.as_ref().is_some_and(TimeoutVote::is_complete) {
            return self.conclude_vote();
        }
        None
    }

    /// Close vote `vote_id` when its window elapses. Stale ids are ignored.
    pub fn expire_vote(&mut self, vote_id: u64) -> Option<VoteOutcome> {
        if self.vote.as_ref().map(|v| v.id) != Some(vote_id) {
            debug!("Ignoring expiry of stale timeout vote {}", vote_id);
            return None;
        }
        self.conclude_vote()
    }

    /// Remove a departed player from the open vote
    pub fn drop_voter(&mut self, voter: PlayerId) -> Option<VoteOutcome> {
        let vote = self.vote.as_mut()?;
        if !vote.drop_voter(voter) {
            return None;
        }
        self.conclude_if_complete()
    }

    fn conclude_vote(&mut self) -> Option<VoteOutcome> {
        let vote = self.vote.take()?;
        let outcome = vote.outcome();
        info!(
            "Timeout vote closed - id: {}, team: {}, yes: {} (+caller), no: {}, eligible: {}, outcome: {:?}",
            vote.id,
            vote.team,
            vote.yes_count(),
            vote.no_count(),
            vote.eligible_count(),
            outcome
        );
        if let VoteOutcome::Passed { team } = outcome {
            self.pending = Some(team);
        }
        Some(outcome)
    }

    /// Start the pending timeout, if any
    pub fn start_pending(&mut self) -> Option<TimeoutStart> {
        let team = self.pending.take()?;
        Some(self.begin(team))
    }

    /// Start `team`'s timeout now, or queue it behind the running one
    pub fn begin(&mut self, team: Team) -> TimeoutStart {
        if self.active.is_some() {
            if !self.queue.contains(&team) {
                self.queue.push_back(team);
            }
            return TimeoutStart::Queued { team };
        }
        let remaining = match team {
            Team::CT => &mut self.remaining_ct,
            Team::T => &mut self.remaining_t,
            Team::Spectator => return TimeoutStart::Exhausted { team },
        };
        if *remaining == 0 {
            return TimeoutStart::Exhausted { team };
        }
        *remaining -= 1;
        let remaining = *remaining;
        self.active = Some(team);
        info!(
            "Timeout started - team: {}, remaining: {}/{}",
            team, remaining, self.max_per_team
        );
        TimeoutStart::Started { team, remaining }
    }

    /// End the running timeout and hand back the next queued team
    pub fn finish(&mut self) -> Option<Team> {
        if let Some(team) = self.active.take() {
            info!("Timeout finished - team: {}", team);
        }
        self.queue.pop_front()
    }
}
