//! Common types used throughout the match orchestrator

use serde::{Deserialize, Serialize};

/// Stable numeric identity of a connected player or bot
pub type PlayerId = u64;

/// Team slot a player occupies on the game server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Spectator,
    T,
    CT,
}

impl Team {
    /// The two playing sides in a fixed order
    pub const PLAYING: [Team; 2] = [Team::CT, Team::T];

    /// The other playing side. Spectator maps onto itself.
    pub fn opposite(self) -> Team {
        match self {
            Team::CT => Team::T,
            Team::T => Team::CT,
            Team::Spectator => Team::Spectator,
        }
    }

    pub fn is_playing(self) -> bool {
        matches!(self, Team::CT | Team::T)
    }

    /// Numeric team index used by the game engine
    pub fn engine_index(self) -> u8 {
        match self {
            Team::Spectator => 1,
            Team::T => 2,
            Team::CT => 3,
        }
    }

    pub fn from_engine_index(index: u8) -> Option<Team> {
        match index {
            1 => Some(Team::Spectator),
            2 => Some(Team::T),
            3 => Some(Team::CT),
            _ => None,
        }
    }

    /// Parse the `t` / `ct` argument accepted by captain commands
    pub fn parse_side(arg: &str) -> Option<Team> {
        match arg.trim().to_lowercase().as_str() {
            "t" => Some(Team::T),
            "ct" => Some(Team::CT),
            _ => None,
        }
    }

    /// Default team name shown by the engine when no captain is named
    pub fn default_name(self) -> &'static str {
        match self {
            Team::CT => "COUNTER-TERRORISTS",
            Team::T => "TERRORISTS",
            Team::Spectator => "SPECTATORS",
        }
    }
}

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Team::Spectator => write!(f, "SPEC"),
            Team::T => write!(f, "T"),
            Team::CT => write!(f, "CT"),
        }
    }
}

/// Identity plus cached display name. Never owns the live player object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerRef {
    pub id: PlayerId,
    pub name: String,
}

impl PlayerRef {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Snapshot of a connected player as reported by the player directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    pub is_bot: bool,
    pub team: Team,
}

impl PlayerInfo {
    pub fn human(id: PlayerId, name: impl Into<String>, team: Team) -> Self {
        Self {
            id,
            name: name.into(),
            is_bot: false,
            team,
        }
    }

    pub fn bot(id: PlayerId, name: impl Into<String>, team: Team) -> Self {
        Self {
            id,
            name: name.into(),
            is_bot: true,
            team,
        }
    }

    pub fn to_ref(&self) -> PlayerRef {
        PlayerRef::new(self.id, self.name.clone())
    }
}

/// Knife round winner's decision about starting sides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideChoice {
    Stay,
    Switch,
}

impl std::fmt::Display for SideChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SideChoice::Stay => write!(f, "stay"),
            SideChoice::Switch => write!(f, "switch"),
        }
    }
}

/// A single timeout vote ballot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ballot {
    Yes,
    No,
}

/// Who issued a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issuer {
    /// Server console; holds every permission
    Console,
    Player {
        id: PlayerId,
        #[serde(default)]
        permissions: Vec<String>,
    },
}

impl Issuer {
    pub fn player(id: PlayerId) -> Self {
        Issuer::Player {
            id,
            permissions: Vec::new(),
        }
    }

    pub fn admin(id: PlayerId, permission: impl Into<String>) -> Self {
        Issuer::Player {
            id,
            permissions: vec![permission.into()],
        }
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        match self {
            Issuer::Console => None,
            Issuer::Player { id, .. } => Some(*id),
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        match self {
            Issuer::Console => true,
            Issuer::Player { permissions, .. } => {
                permission.is_empty() || permissions.iter().any(|p| p == permission)
            }
        }
    }
}
