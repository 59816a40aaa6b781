//! Captain assignment with randomized fallback

use crate::error::{MatchError, MatchResult};
use crate::players::PlayerDirectory;
use crate::roster::draft::{DraftState, RosterStage};
use crate::types::{PlayerId, PlayerInfo, PlayerRef, Team};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

/// Assigns and reassigns the two team captains
pub struct CaptainSelector;

impl CaptainSelector {
    /// Validate an explicitly requested captain and seat them
    pub fn assign(
        draft: &mut DraftState,
        team: Team,
        candidate: &PlayerInfo,
        stage: RosterStage,
    ) -> MatchResult<PlayerRef> {
        if !team.is_playing() {
            return Err(MatchError::invalid_argument("captain team must be t or ct"));
        }
        if draft
            .captain(team.opposite())
            .is_some_and(|c| c.id == candidate.id)
        {
            return Err(MatchError::invalid_argument(format!(
                "{} is already the {} captain",
                candidate.name,
                team.opposite()
            )));
        }
        let captain = candidate.to_ref();
        draft.seat_captain(team, captain.clone(), stage);
        info!(
            "Captain assigned - team: {}, player: '{}' ({})",
            team, captain.name, captain.id
        );
        Ok(captain)
    }

    /// Players who could captain `team`: connected players on a playing side,
    /// excluding both current captains and anyone drafted for the other team
    pub fn eligible_pool(
        draft: &DraftState,
        team: Team,
        directory: &dyn PlayerDirectory,
    ) -> Vec<PlayerInfo> {
        directory
            .playing_players()
            .into_iter()
            .filter(|p| !draft.is_captain(p.id))
            .filter(|p| draft.team_of(RosterStage::Picked, p.id) != Some(team.opposite()))
            .filter(|p| draft.team_of(RosterStage::Playing, p.id) != Some(team.opposite()))
            .collect()
    }

    /// Seat a uniformly random eligible player for `team`
    pub fn assign_random<R: Rng + ?Sized>(
        draft: &mut DraftState,
        team: Team,
        directory: &dyn PlayerDirectory,
        stage: RosterStage,
        rng: &mut R,
    ) -> MatchResult<PlayerRef> {
        let pool = Self::eligible_pool(draft, team, directory);
        let candidate = pool.choose(rng).ok_or_else(|| MatchError::SelectionFailed {
            reason: format!("no eligible player to captain {}", team),
        })?;
        Self::assign(draft, team, candidate, stage)
    }

    /// Keep a connected captain, otherwise seat a random one
    pub fn ensure<R: Rng + ?Sized>(
        draft: &mut DraftState,
        team: Team,
        directory: &dyn PlayerDirectory,
        stage: RosterStage,
        rng: &mut R,
    ) -> MatchResult<PlayerRef> {
        if let Some(captain) = draft.captain(team).and_then(|c| directory.refresh(c)) {
            return Ok(captain);
        }
        draft.set_captain(team, None);
        Self::assign_random(draft, team, directory, stage, rng)
    }

    /// Seat a new drafting captain for `team` after the old one left.
    ///
    /// A connected player already drafted for the team is preferred, otherwise
    /// a random undrafted connected player is taken whatever slot they sit in.
    pub fn replace_for_draft<R: Rng + ?Sized>(
        draft: &mut DraftState,
        team: Team,
        directory: &dyn PlayerDirectory,
        rng: &mut R,
    ) -> MatchResult<PlayerRef> {
        if let Some(captain) = draft.captain(team).and_then(|c| directory.refresh(c)) {
            return Ok(captain);
        }
        draft.set_captain(team, None);

        let connected = directory.connected_players();
        let teammate = draft
            .picked(team)
            .iter()
            .find_map(|p| connected.iter().find(|c| c.id == p.id))
            .cloned();
        let candidate = match teammate {
            Some(player) => player,
            None => {
                let chosen = draft.remaining_pool(&connected).choose(rng).map(|p| p.id);
                connected
                    .iter()
                    .find(|p| Some(p.id) == chosen)
                    .cloned()
                    .ok_or_else(|| MatchError::SelectionFailed {
                        reason: format!("no eligible player to captain {}", team),
                    })?
            }
        };
        Self::assign(draft, team, &candidate, RosterStage::Picked)
    }

    /// Replace a departed captain without restarting the phase.
    ///
    /// The first remaining connected member of the team's roster is promoted;
    /// with an empty roster a random eligible player is used. Returns `None`
    /// and leaves the slot empty when nobody qualifies.
    pub fn promote<R: Rng + ?Sized>(
        draft: &mut DraftState,
        team: Team,
        departed: PlayerId,
        directory: &dyn PlayerDirectory,
        stage: RosterStage,
        rng: &mut R,
    ) -> Option<PlayerRef> {
        draft.set_captain(team, None);
        let teammate = draft
            .roster(stage, team)
            .iter()
            .filter(|p| p.id != departed)
            .find_map(|p| directory.player(p.id));

        let promoted = match teammate {
            Some(next) => Self::assign(draft, team, &next, stage).ok(),
            None => Self::assign_random(draft, team, directory, stage, rng).ok(),
        };

        match &promoted {
            Some(captain) => info!(
                "Captain promoted - team: {}, player: '{}' ({})",
                team, captain.name, captain.id
            ),
            None => debug!("No replacement captain available for {}", team),
        }
        promoted
    }
}
