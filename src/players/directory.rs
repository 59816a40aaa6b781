//! Player directory trait and the in-memory implementation

use crate::types::{PlayerId, PlayerInfo, PlayerRef, Team};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Resolves connected players by stable id
pub trait PlayerDirectory: Send + Sync {
    /// Every connected player, humans and bots, in a stable order
    fn connected_players(&self) -> Vec<PlayerInfo>;

    /// Resolve one player; `None` once they disconnected
    fn player(&self, id: PlayerId) -> Option<PlayerInfo>;

    fn is_connected(&self, id: PlayerId) -> bool {
        self.player(id).is_some()
    }

    fn connected_count(&self) -> usize {
        self.connected_players().len()
    }

    /// Connected players whose live team slot is `team`
    fn players_on(&self, team: Team) -> Vec<PlayerInfo> {
        self.connected_players()
            .into_iter()
            .filter(|p| p.team == team)
            .collect()
    }

    /// Connected players sitting on CT or T
    fn playing_players(&self) -> Vec<PlayerInfo> {
        self.connected_players()
            .into_iter()
            .filter(|p| p.team.is_playing())
            .collect()
    }

    /// Refresh a cached reference. `None` when the player is gone.
    fn refresh(&self, player: &PlayerRef) -> Option<PlayerRef> {
        self.player(player.id).map(|info| info.to_ref())
    }
}

/// Directory kept in process memory.
///
/// The AMQP bridge mirrors connect, disconnect and team events into it; tests
/// and the simulator drive it directly.
#[derive(Debug, Default)]
pub struct InMemoryPlayerDirectory {
    players: RwLock<BTreeMap<PlayerId, PlayerInfo>>,
}

impl InMemoryPlayerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_players(players: impl IntoIterator<Item = PlayerInfo>) -> Self {
        let directory = Self::new();
        for player in players {
            directory.connect(player);
        }
        directory
    }

    pub fn connect(&self, player: PlayerInfo) {
        debug!(
            "Directory connect - id: {}, name: '{}', bot: {}",
            player.id, player.name, player.is_bot
        );
        self.write().insert(player.id, player);
    }

    pub fn disconnect(&self, id: PlayerId) -> Option<PlayerInfo> {
        let removed = self.write().remove(&id);
        if removed.is_some() {
            debug!("Directory disconnect - id: {}", id);
        }
        removed
    }

    /// Record a team slot change. Returns false for unknown players.
    pub fn set_team(&self, id: PlayerId, team: Team) -> bool {
        match self.write().get_mut(&id) {
            Some(player) => {
                player.team = team;
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<PlayerId, PlayerInfo>> {
        self.players.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<PlayerId, PlayerInfo>> {
        self.players
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PlayerDirectory for InMemoryPlayerDirectory {
    fn connected_players(&self) -> Vec<PlayerInfo> {
        self.read().values().cloned().collect()
    }

    fn player(&self, id: PlayerId) -> Option<PlayerInfo> {
        self.read().get(&id).cloned()
    }

    fn connected_count(&self) -> usize {
        self.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_disconnect_and_team_changes() {
        let directory = InMemoryPlayerDirectory::with_players([
            PlayerInfo::human(1, "alice", Team::CT),
            PlayerInfo::bot(2, "bot_bob", Team::T),
            PlayerInfo::human(3, "carol", Team::Spectator),
        ]);

        assert_eq!(directory.connected_count(), 3);
        assert_eq!(directory.playing_players().len(), 2);
        assert_eq!(directory.players_on(Team::T)[0].name, "bot_bob");

        assert!(directory.set_team(3, Team::T));
        assert_eq!(directory.players_on(Team::T).len(), 2);
        assert!(!directory.set_team(99, Team::T));

        assert!(directory.disconnect(1).is_some());
        assert!(!directory.is_connected(1));
        assert!(directory.refresh(&PlayerRef::new(1, "alice")).is_none());
        assert_eq!(
            directory.refresh(&PlayerRef::new(3, "old name")).unwrap().name,
            "carol"
        );
    }
}
