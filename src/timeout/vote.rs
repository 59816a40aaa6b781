//! Team vote deciding whether a requested timeout is called

use crate::error::{MatchError, MatchResult};
use crate::types::{Ballot, PlayerId, PlayerRef, Team};
use serde::{Deserialize, Serialize};

/// Result of a concluded vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteOutcome {
    Passed { team: Team },
    Failed { team: Team },
}

/// One in-flight vote among the caller's teammates.
///
/// The caller counts as an implicit yes. The vote passes when yes votes,
/// caller included, are a strict majority of the team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutVote {
    pub id: u64,
    pub team: Team,
    pub caller: PlayerRef,
    eligible: Vec<PlayerId>,
    yes: Vec<PlayerId>,
    no: Vec<PlayerId>,
}

impl TimeoutVote {
    pub fn new(id: u64, team: Team, caller: PlayerRef, teammates: Vec<PlayerId>) -> Self {
        let eligible = teammates.into_iter().filter(|id| *id != caller.id).collect();
        Self {
            id,
            team,
            caller,
            eligible,
            yes: Vec::new(),
            no: Vec::new(),
        }
    }

    pub fn is_eligible(&self, voter: PlayerId) -> bool {
        self.eligible.contains(&voter)
    }

    pub fn has_voted(&self, voter: PlayerId) -> bool {
        self.yes.contains(&voter) || self.no.contains(&voter)
    }

    pub fn cast(&mut self, voter: PlayerId, ballot: Ballot) -> MatchResult<()> {
        if !self.is_eligible(voter) {
            return Err(MatchError::invalid_argument(format!(
                "player {} cannot vote on this timeout",
                voter
            )));
        }
        if self.has_voted(voter) {
            return Err(MatchError::AlreadyVoted { player_id: voter });
        }
        match ballot {
            Ballot::Yes => self.yes.push(voter),
            Ballot::No => self.no.push(voter),
        }
        Ok(())
    }

    /// Remove a departed teammate along with any ballot they cast
    pub fn drop_voter(&mut self, voter: PlayerId) -> bool {
        let before = self.eligible.len();
        self.eligible.retain(|v| *v != voter);
        self.yes.retain(|v| *v != voter);
        self.no.retain(|v| *v != voter);
        self.eligible.len() != before
    }

    pub fn yes_count(&self) -> usize {
        self.yes.len()
    }

    pub fn no_count(&self) -> usize {
        self.no.len()
    }

    pub fn eligible_count(&self) -> usize {
        self.eligible.len()
    }

    /// Teammates who have not voted yet
    pub fn outstanding(&self) -> Vec<PlayerId> {
        self.eligible
            .iter()
            .copied()
            .filter(|v| !self.has_voted(*v))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.yes.len() + self.no.len() >= self.eligible.len()
    }

    pub fn passes(&self) -> bool {
        let team_size = self.eligible.len() + 1;
        (self.yes.len() + 1) * 2 > team_size
    }

    pub fn outcome(&self) -> VoteOutcome {
        if self.passes() {
            VoteOutcome::Passed { team: self.team }
        } else {
            VoteOutcome::Failed { team: self.team }
        }
    }
}
