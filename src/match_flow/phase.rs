//! Match phases

use crate::roster::RosterStage;
use serde::{Deserialize, Serialize};

/// The single phase variable every decision is gated on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MatchPhase {
    #[default]
    Warmup,
    MapVoting,
    MapChosen,
    MapLoading,
    PickingTeam,
    KnifeRound,
    PickingStartingSide,
    Match,
    Timeout,
    Reset,
    Ended,
}

impl MatchPhase {
    pub const ALL: [MatchPhase; 11] = [
        MatchPhase::Warmup,
        MatchPhase::MapVoting,
        MatchPhase::MapChosen,
        MatchPhase::MapLoading,
        MatchPhase::PickingTeam,
        MatchPhase::KnifeRound,
        MatchPhase::PickingStartingSide,
        MatchPhase::Match,
        MatchPhase::Timeout,
        MatchPhase::Reset,
        MatchPhase::Ended,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MatchPhase::Warmup => "warmup",
            MatchPhase::MapVoting => "map_voting",
            MatchPhase::MapChosen => "map_chosen",
            MatchPhase::MapLoading => "map_loading",
            MatchPhase::PickingTeam => "picking_team",
            MatchPhase::KnifeRound => "knife_round",
            MatchPhase::PickingStartingSide => "picking_starting_side",
            MatchPhase::Match => "match",
            MatchPhase::Timeout => "timeout",
            MatchPhase::Reset => "reset",
            MatchPhase::Ended => "ended",
        }
    }

    /// Numeric code exported as a gauge
    pub fn code(self) -> i64 {
        Self::ALL.iter().position(|p| *p == self).unwrap_or(0) as i64
    }

    /// Phases where captains can be set by command
    pub fn allows_captain_assignment(self) -> bool {
        matches!(
            self,
            MatchPhase::Warmup | MatchPhase::MapLoading | MatchPhase::MapChosen
        )
    }

    /// Phases where anyone may freely change team
    pub fn allows_free_team_changes(self) -> bool {
        matches!(
            self,
            MatchPhase::Warmup | MatchPhase::MapVoting | MatchPhase::MapChosen
        )
    }

    /// Phases after the draft where the playing rosters are authoritative
    pub fn has_fixed_teams(self) -> bool {
        matches!(
            self,
            MatchPhase::KnifeRound
                | MatchPhase::PickingStartingSide
                | MatchPhase::Match
                | MatchPhase::Timeout
        )
    }

    /// Which roster pair captains are seated into during this phase
    pub fn captain_stage(self) -> RosterStage {
        if self.has_fixed_teams() {
            RosterStage::Playing
        } else {
            RosterStage::Picked
        }
    }

    /// Whether leaving now is sanctioned at the given sensitivity level
    pub fn is_punishable(self, sensitivity: u8) -> bool {
        match self {
            MatchPhase::Match | MatchPhase::Timeout => true,
            MatchPhase::KnifeRound | MatchPhase::PickingStartingSide => sensitivity >= 1,
            MatchPhase::PickingTeam => sensitivity >= 2,
            _ => false,
        }
    }
}

impl std::fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_punishment_sensitivity_levels() {
        assert!(MatchPhase::Match.is_punishable(0));
        assert!(MatchPhase::Timeout.is_punishable(0));
        assert!(!MatchPhase::KnifeRound.is_punishable(0));
        assert!(MatchPhase::PickingStartingSide.is_punishable(1));
        assert!(!MatchPhase::PickingTeam.is_punishable(1));
        assert!(MatchPhase::PickingTeam.is_punishable(2));
        assert!(!MatchPhase::Warmup.is_punishable(5));
    }

    #[test]
    fn test_codes_are_distinct() {
        let mut codes: Vec<i64> = MatchPhase::ALL.iter().map(|p| p.code()).collect();
        codes.dedup();
        assert_eq!(codes.len(), 11);
        assert_eq!(MatchPhase::default(), MatchPhase::Warmup);
    }

    #[test]
    fn test_captain_stage_follows_fixed_teams() {
        assert_eq!(MatchPhase::MapChosen.captain_stage(), RosterStage::Picked);
        assert_eq!(MatchPhase::KnifeRound.captain_stage(), RosterStage::Playing);
    }
}
