//! Team rosters for the draft and the match
//!
//! `picked_*` hold the draft in progress. When the knife round starts they
//! are promoted to `playing_*`, which stay authoritative until the next reset.
//! A player id is never in both sets of the same stage.

use crate::types::{PlayerId, PlayerInfo, PlayerRef, Team};
use serde::{Deserialize, Serialize};

/// Which pair of rosters an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RosterStage {
    Picked,
    Playing,
}

/// What purging a departed player removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeOutcome {
    /// Team the player captained, if any. The slot itself is left untouched.
    pub captain_of: Option<Team>,
    pub removed_from_picked: Option<Team>,
    pub removed_from_playing: Option<Team>,
}

/// Captains plus draft and match rosters for both teams
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftState {
    captain_ct: Option<PlayerRef>,
    captain_t: Option<PlayerRef>,
    picked_ct: Vec<PlayerRef>,
    picked_t: Vec<PlayerRef>,
    playing_ct: Vec<PlayerRef>,
    playing_t: Vec<PlayerRef>,
    turn: Option<Team>,
}

impl DraftState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn captain(&self, team: Team) -> Option<&PlayerRef> {
        match team {
            Team::CT => self.captain_ct.as_ref(),
            Team::T => self.captain_t.as_ref(),
            Team::Spectator => None,
        }
    }

    /// Team captained by `id`
    pub fn captain_team(&self, id: PlayerId) -> Option<Team> {
        Team::PLAYING
            .into_iter()
            .find(|team| self.captain(*team).is_some_and(|c| c.id == id))
    }

    pub fn is_captain(&self, id: PlayerId) -> bool {
        self.captain_team(id).is_some()
    }

    pub fn both_captains_assigned(&self) -> bool {
        self.captain_ct.is_some() && self.captain_t.is_some()
    }

    /// Set or clear a captain slot without touching any roster
    pub fn set_captain(&mut self, team: Team, captain: Option<PlayerRef>) {
        match team {
            Team::CT => self.captain_ct = captain,
            Team::T => self.captain_t = captain,
            Team::Spectator => {}
        }
    }

    /// Seat `captain` for `team`, removing the previous captain from that
    /// team's roster at `stage` and adding the new one
    pub fn seat_captain(&mut self, team: Team, captain: PlayerRef, stage: RosterStage) {
        if let Some(previous) = self.captain(team).cloned() {
            self.remove_from(stage, team, previous.id);
        }
        self.add(stage, team, captain.clone());
        self.set_captain(team, Some(captain));
    }

    pub fn roster(&self, stage: RosterStage, team: Team) -> &[PlayerRef] {
        match (stage, team) {
            (RosterStage::Picked, Team::CT) => &self.picked_ct,
            (RosterStage::Picked, Team::T) => &self.picked_t,
            (RosterStage::Playing, Team::CT) => &self.playing_ct,
            (RosterStage::Playing, Team::T) => &self.playing_t,
            (_, Team::Spectator) => &[],
        }
    }

    fn roster_mut(&mut self, stage: RosterStage, team: Team) -> Option<&mut Vec<PlayerRef>> {
        match (stage, team) {
            (RosterStage::Picked, Team::CT) => Some(&mut self.picked_ct),
            (RosterStage::Picked, Team::T) => Some(&mut self.picked_t),
            (RosterStage::Playing, Team::CT) => Some(&mut self.playing_ct),
            (RosterStage::Playing, Team::T) => Some(&mut self.playing_t),
            (_, Team::Spectator) => None,
        }
    }

    pub fn picked(&self, team: Team) -> &[PlayerRef] {
        self.roster(RosterStage::Picked, team)
    }

    pub fn playing(&self, team: Team) -> &[PlayerRef] {
        self.roster(RosterStage::Playing, team)
    }

    /// Team whose roster at `stage` lists `id`
    pub fn team_of(&self, stage: RosterStage, id: PlayerId) -> Option<Team> {
        Team::PLAYING
            .into_iter()
            .find(|team| self.roster(stage, *team).iter().any(|p| p.id == id))
    }

    /// Add to a team, moving the player off the other team of the same stage.
    /// Returns false if already listed on `team`.
    pub fn add(&mut self, stage: RosterStage, team: Team, player: PlayerRef) -> bool {
        if !team.is_playing() {
            return false;
        }
        if self.roster(stage, team).iter().any(|p| p.id == player.id) {
            return false;
        }
        self.remove_from(stage, team.opposite(), player.id);
        if let Some(roster) = self.roster_mut(stage, team) {
            roster.push(player);
        }
        true
    }

    pub fn remove_from(&mut self, stage: RosterStage, team: Team, id: PlayerId) -> bool {
        match self.roster_mut(stage, team) {
            Some(roster) => {
                let before = roster.len();
                roster.retain(|p| p.id != id);
                roster.len() != before
            }
            None => false,
        }
    }

    /// Remove from both teams at `stage`
    pub fn remove(&mut self, stage: RosterStage, id: PlayerId) -> Option<Team> {
        let team = self.team_of(stage, id)?;
        self.remove_from(stage, team, id);
        Some(team)
    }

    /// Drop a departed player from every roster
    pub fn purge(&mut self, id: PlayerId) -> PurgeOutcome {
        PurgeOutcome {
            captain_of: self.captain_team(id),
            removed_from_picked: self.remove(RosterStage::Picked, id),
            removed_from_playing: self.remove(RosterStage::Playing, id),
        }
    }

    pub fn picked_total(&self) -> usize {
        self.picked_ct.len() + self.picked_t.len()
    }

    pub fn playing_total(&self) -> usize {
        self.playing_ct.len() + self.playing_t.len()
    }

    /// Connected players not drafted yet and not captaining
    pub fn remaining_pool(&self, connected: &[PlayerInfo]) -> Vec<PlayerRef> {
        connected
            .iter()
            .filter(|p| !self.is_captain(p.id))
            .filter(|p| self.team_of(RosterStage::Picked, p.id).is_none())
            .map(PlayerInfo::to_ref)
            .collect()
    }

    /// Drafted rosters become the match rosters; the draft is cleared
    pub fn promote_picked_to_playing(&mut self) {
        self.playing_ct = std::mem::take(&mut self.picked_ct);
        self.playing_t = std::mem::take(&mut self.picked_t);
        self.turn = None;
    }

    /// Replace the match rosters outright
    pub fn set_playing(&mut self, ct: Vec<PlayerRef>, t: Vec<PlayerRef>) {
        self.playing_ct = ct;
        self.playing_t = t;
    }

    /// Swap match rosters and captains between the two sides
    pub fn swap_sides(&mut self) {
        std::mem::swap(&mut self.playing_ct, &mut self.playing_t);
        std::mem::swap(&mut self.captain_ct, &mut self.captain_t);
    }

    /// Restart the draft. Seated captains stay on their own team.
    pub fn clear_picks(&mut self) {
        self.picked_ct.clear();
        self.picked_t.clear();
        self.turn = None;
        for team in Team::PLAYING {
            if let Some(captain) = self.captain(team).cloned() {
                self.add(RosterStage::Picked, team, captain);
            }
        }
    }

    pub fn turn(&self) -> Option<Team> {
        self.turn
    }

    pub fn set_turn(&mut self, team: Option<Team>) {
        self.turn = team;
    }

    /// True when no player id appears on both teams of the same stage
    pub fn is_consistent(&self) -> bool {
        let disjoint =
            |a: &[PlayerRef], b: &[PlayerRef]| a.iter().all(|p| b.iter().all(|q| q.id != p.id));
        disjoint(&self.picked_ct, &self.picked_t) && disjoint(&self.playing_ct, &self.playing_t)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: PlayerId) -> PlayerRef {
        PlayerRef::new(id, format!("player{}", id))
    }

    #[test]
    fn test_add_keeps_teams_disjoint() {
        let mut draft = DraftState::new();
        assert!(draft.add(RosterStage::Picked, Team::CT, player(1)));
        assert!(!draft.add(RosterStage::Picked, Team::CT, player(1)));
        assert!(draft.add(RosterStage::Picked, Team::T, player(1)));
        assert!(draft.picked(Team::CT).is_empty());
        assert_eq!(draft.team_of(RosterStage::Picked, 1), Some(Team::T));
        assert!(draft.is_consistent());
    }

    #[test]
    fn test_seat_captain_replaces_previous_captain_in_roster() {
        let mut draft = DraftState::new();
        draft.seat_captain(Team::CT, player(1), RosterStage::Picked);
        draft.seat_captain(Team::CT, player(2), RosterStage::Picked);
        assert_eq!(draft.captain(Team::CT), Some(&player(2)));
        assert_eq!(draft.picked(Team::CT), &[player(2)]);
        assert_eq!(draft.captain_team(2), Some(Team::CT));
        assert_eq!(draft.captain_team(1), None);
    }

    #[test]
    fn test_remaining_pool_excludes_captains_and_picks() {
        let mut draft = DraftState::new();
        draft.seat_captain(Team::CT, player(1), RosterStage::Picked);
        draft.seat_captain(Team::T, player(2), RosterStage::Picked);
        draft.add(RosterStage::Picked, Team::CT, player(3));
        let connected: Vec<PlayerInfo> = (1..=5)
            .map(|id| PlayerInfo::human(id, format!("player{}", id), Team::Spectator))
            .collect();
        let pool: Vec<PlayerId> = draft.remaining_pool(&connected).iter().map(|p| p.id).collect();
        assert_eq!(pool, vec![4, 5]);
    }

    #[test]
    fn test_promote_and_swap() {
        let mut draft = DraftState::new();
        draft.seat_captain(Team::CT, player(1), RosterStage::Picked);
        draft.seat_captain(Team::T, player(2), RosterStage::Picked);
        draft.add(RosterStage::Picked, Team::T, player(3));
        draft.promote_picked_to_playing();
        assert_eq!(draft.picked_total(), 0);
        assert_eq!(draft.playing_total(), 3);

        draft.swap_sides();
        assert_eq!(draft.captain(Team::CT), Some(&player(2)));
        assert_eq!(draft.playing(Team::CT).len(), 2);
        assert_eq!(draft.playing(Team::T), &[player(1)]);
    }

    #[test]
    fn test_purge_reports_captaincy_without_clearing_slot() {
        let mut draft = DraftState::new();
        draft.seat_captain(Team::T, player(7), RosterStage::Playing);
        let outcome = draft.purge(7);
        assert_eq!(outcome.captain_of, Some(Team::T));
        assert_eq!(outcome.removed_from_playing, Some(Team::T));
        assert_eq!(outcome.removed_from_picked, None);
        assert!(draft.playing(Team::T).is_empty());
        assert!(draft.captain(Team::T).is_some());
    }
}
