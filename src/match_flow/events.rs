//! Inputs accepted by the orchestrator

use crate::types::{Ballot, Issuer, PlayerId, SideChoice, Team};
use serde::{Deserialize, Serialize};

/// A choice made in one of the orchestrator's menus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MenuSelection {
    /// Map picked in the vote menu, by engine or display name
    MapVote { map: String },
    DraftPick { player: PlayerId },
    CaptainPick { team: Team, player: PlayerId },
    Side { choice: SideChoice },
    TimeoutBallot { ballot: Ballot },
}

/// Externally arriving event, processed strictly in arrival order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchEvent {
    /// A chat or console command line, e.g. `!ready` or `mix_reset`
    Command { issuer: Issuer, line: String },
    MenuSelection { player: PlayerId, selection: MenuSelection },
    /// Player finished connecting and is in the directory
    PlayerConnected { player: PlayerId },
    /// Player left; the bridge drops them from the directory before sending this
    PlayerDisconnected { player: PlayerId, name: String },
    /// Player asked to switch team slot
    TeamChangeRequested { player: PlayerId, team: Team },
    /// The engine finished loading a map
    MapStarted { map: String },
    RoundPrestart,
    RoundStart,
    FreezeTimeEnded,
    RoundEnded { winner: Team },
    /// Last round of the first half was played
    Halftime,
    MatchEnded,
}

impl MatchEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MatchEvent::Command { .. } => "command",
            MatchEvent::MenuSelection { .. } => "menu_selection",
            MatchEvent::PlayerConnected { .. } => "player_connected",
            MatchEvent::PlayerDisconnected { .. } => "player_disconnected",
            MatchEvent::TeamChangeRequested { .. } => "team_change_requested",
            MatchEvent::MapStarted { .. } => "map_started",
            MatchEvent::RoundPrestart => "round_prestart",
            MatchEvent::RoundStart => "round_start",
            MatchEvent::FreezeTimeEnded => "freeze_time_ended",
            MatchEvent::RoundEnded { .. } => "round_ended",
            MatchEvent::Halftime => "halftime",
            MatchEvent::MatchEnded => "match_ended",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let raw = r#"{"type":"command","issuer":{"kind":"player","id":7},"line":"!ready"}"#;
        let event: MatchEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(
            event,
            MatchEvent::Command {
                issuer: Issuer::player(7),
                line: "!ready".to_string()
            }
        );
        assert_eq!(event.name(), "command");

        let raw = r#"{"type":"round_ended","winner":"ct"}"#;
        let event: MatchEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event, MatchEvent::RoundEnded { winner: Team::CT });
    }
}
