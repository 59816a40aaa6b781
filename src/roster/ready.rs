//! Ready roster gating the lobby phases

use crate::error::{MatchError, MatchResult};
use crate::match_flow::MatchPhase;
use crate::players::PlayerDirectory;
use crate::types::{PlayerId, PlayerRef};
use serde::{Deserialize, Serialize};

/// What a ready or unready request did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadyChange {
    Marked,
    AlreadyReady,
    Cleared,
    AlreadyUnready,
}

impl ReadyChange {
    /// True when the roster changed
    pub fn changed(self) -> bool {
        matches!(self, ReadyChange::Marked | ReadyChange::Cleared)
    }
}

/// Players who declared readiness, compared by id, in the order they readied up
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadyRoster {
    players: Vec<PlayerRef>,
}

impl ReadyRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Players may only change their readiness in these phases
    pub fn accepts_changes(phase: MatchPhase) -> bool {
        matches!(phase, MatchPhase::Warmup | MatchPhase::MapChosen)
    }

    /// Ready count needed to advance: the configured minimum, raised to the
    /// number of connected players when more are present
    pub fn required(minimum: usize, connected: usize) -> usize {
        minimum.max(connected)
    }

    pub fn mark_ready(&mut self, phase: MatchPhase, player: PlayerRef) -> MatchResult<ReadyChange> {
        if !Self::accepts_changes(phase) {
            return Err(MatchError::invalid_state("ready", phase));
        }
        if self.contains(player.id) {
            return Ok(ReadyChange::AlreadyReady);
        }
        self.players.push(player);
        Ok(ReadyChange::Marked)
    }

    pub fn mark_unready(&mut self, phase: MatchPhase, id: PlayerId) -> MatchResult<ReadyChange> {
        if !Self::accepts_changes(phase) {
            return Err(MatchError::invalid_state("unready", phase));
        }
        if self.purge(id) {
            Ok(ReadyChange::Cleared)
        } else {
            Ok(ReadyChange::AlreadyUnready)
        }
    }

    /// Remove a departed player regardless of phase
    pub fn purge(&mut self, id: PlayerId) -> bool {
        let before = self.players.len();
        self.players.retain(|p| p.id != id);
        self.players.len() != before
    }

    /// Drop anyone the directory no longer knows
    pub fn retain_connected(&mut self, directory: &dyn PlayerDirectory) -> usize {
        let before = self.players.len();
        self.players.retain(|p| directory.is_connected(p.id));
        before - self.players.len()
    }

    pub fn clear(&mut self) {
        self.players.clear();
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.iter().any(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn players(&self) -> &[PlayerRef] {
        &self.players
    }

    pub fn threshold_met(&self, minimum: usize, connected: usize) -> bool {
        self.len() >= Self::required(minimum, connected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: PlayerId) -> PlayerRef {
        PlayerRef::new(id, format!("player{}", id))
    }

    #[test]
    fn test_ready_is_idempotent() {
        let mut roster = ReadyRoster::new();
        assert_eq!(
            roster.mark_ready(MatchPhase::Warmup, player(1)),
            Ok(ReadyChange::Marked)
        );
        assert_eq!(
            roster.mark_ready(MatchPhase::Warmup, player(1)),
            Ok(ReadyChange::AlreadyReady)
        );
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_unready_without_ready_is_signalled() {
        let mut roster = ReadyRoster::new();
        assert_eq!(
            roster.mark_unready(MatchPhase::MapChosen, 5),
            Ok(ReadyChange::AlreadyUnready)
        );
        roster.mark_ready(MatchPhase::MapChosen, player(5)).unwrap();
        assert_eq!(
            roster.mark_unready(MatchPhase::MapChosen, 5),
            Ok(ReadyChange::Cleared)
        );
        assert!(roster.is_empty());
    }

    #[test]
    fn test_rejected_outside_lobby_phases() {
        let mut roster = ReadyRoster::new();
        for phase in [MatchPhase::MapVoting, MatchPhase::Match, MatchPhase::KnifeRound] {
            assert!(matches!(
                roster.mark_ready(phase, player(1)),
                Err(MatchError::InvalidState { .. })
            ));
        }
        assert!(roster.is_empty());
    }

    #[test]
    fn test_required_uses_connected_count_as_floor() {
        assert_eq!(ReadyRoster::required(10, 4), 10);
        assert_eq!(ReadyRoster::required(10, 12), 12);

        let mut roster = ReadyRoster::new();
        for id in 0..10 {
            roster.mark_ready(MatchPhase::Warmup, player(id)).unwrap();
        }
        assert!(roster.threshold_met(10, 10));
        assert!(!roster.threshold_met(10, 11));
    }

    #[test]
    fn test_purge_works_in_any_phase() {
        let mut roster = ReadyRoster::new();
        roster.mark_ready(MatchPhase::Warmup, player(1)).unwrap();
        assert!(roster.purge(1));
        assert!(!roster.purge(1));
    }
}
