//! Test fixtures for driving the orchestrator through whole scenarios

#![allow(dead_code)]

use mix_scrims::config::{AppConfig, MapEntry};
use mix_scrims::match_flow::{Effect, EngineCommand, MatchEvent, Menu, MenuSelection, Notice};
use mix_scrims::{
    Ballot, InMemoryPlayerDirectory, Issuer, MatchOrchestrator, MatchPhase, PlayerId, PlayerInfo,
    SideChoice, Team,
};
use std::sync::Arc;
use std::time::Duration;

pub const SEED: u64 = 20240611;

/// Defaults with a custom ready minimum
pub fn config_with_minimum(minimum_ready: usize) -> AppConfig {
    let mut config = AppConfig::with_defaults();
    config.mix.minimum_ready_players = minimum_ready;
    config
}

/// Humans `1..=count`, odd ids on CT and even ids on T
pub fn split_players(count: u64) -> Vec<PlayerInfo> {
    (1..=count)
        .map(|id| {
            let team = if id % 2 == 1 { Team::CT } else { Team::T };
            PlayerInfo::human(id, format!("player{}", id), team)
        })
        .collect()
}

/// An orchestrator plus the game server around it.
///
/// Like the bridge, the harness applies `MovePlayer` effects to the directory
/// and answers change-level commands with a `MapStarted` event. Every effect
/// is kept in `log` until [`ScenarioHarness::clear_log`].
pub struct ScenarioHarness {
    pub orchestrator: MatchOrchestrator,
    pub directory: Arc<InMemoryPlayerDirectory>,
    pub log: Vec<Effect>,
    pub auto_map_start: bool,
}

impl ScenarioHarness {
    pub fn new(config: &AppConfig, players: Vec<PlayerInfo>) -> Self {
        let directory = Arc::new(InMemoryPlayerDirectory::with_players(players));
        let orchestrator = MatchOrchestrator::with_seed(config, directory.clone(), SEED);
        Self {
            orchestrator,
            directory,
            log: Vec::new(),
            auto_map_start: true,
        }
    }

    /// `count` humans split across the teams, ready minimum equal to `count`
    pub fn with_players(count: u64) -> Self {
        Self::new(&config_with_minimum(count as usize), split_players(count))
    }

    pub fn phase(&self) -> MatchPhase {
        self.orchestrator.phase()
    }

    pub fn send(&mut self, event: MatchEvent) -> Vec<Effect> {
        let effects = self.orchestrator.handle(event);
        self.apply(effects)
    }

    pub fn wait(&mut self, seconds: u64) -> Vec<Effect> {
        let effects = self.orchestrator.advance(Duration::from_secs(seconds));
        self.apply(effects)
    }

    fn apply(&mut self, effects: Vec<Effect>) -> Vec<Effect> {
        let mut all = Vec::new();
        let mut started = Vec::new();
        for effect in &effects {
            match effect {
                Effect::MovePlayer { player, team } => {
                    self.directory.set_team(*player, *team);
                }
                Effect::Engine {
                    command:
                        EngineCommand::ChangeLevel { map }
                        | EngineCommand::WorkshopChangeLevel { map, .. },
                } if self.auto_map_start => started.push(map.clone()),
                _ => {}
            }
        }
        self.log.extend(effects.iter().cloned());
        all.extend(effects);
        for map in started {
            all.extend(self.send(MatchEvent::MapStarted { map }));
        }
        all
    }

    pub fn say(&mut self, player: PlayerId, line: &str) -> Vec<Effect> {
        self.send(MatchEvent::Command {
            issuer: Issuer::player(player),
            line: line.to_string(),
        })
    }

    pub fn console(&mut self, line: &str) -> Vec<Effect> {
        self.send(MatchEvent::Command {
            issuer: Issuer::Console,
            line: line.to_string(),
        })
    }

    pub fn select(&mut self, player: PlayerId, selection: MenuSelection) -> Vec<Effect> {
        self.send(MatchEvent::MenuSelection { player, selection })
    }

    pub fn vote_map(&mut self, player: PlayerId, map: &str) -> Vec<Effect> {
        self.select(
            player,
            MenuSelection::MapVote {
                map: map.to_string(),
            },
        )
    }

    pub fn ballot(&mut self, player: PlayerId, ballot: Ballot) -> Vec<Effect> {
        self.select(player, MenuSelection::TimeoutBallot { ballot })
    }

    pub fn ready_all(&mut self) -> Vec<Effect> {
        let ids: Vec<PlayerId> = self
            .directory_players()
            .into_iter()
            .filter(|p| !p.is_bot)
            .map(|p| p.id)
            .collect();
        let mut effects = Vec::new();
        for id in ids {
            effects.extend(self.say(id, "!ready"));
        }
        effects
    }

    pub fn connect(&mut self, player: PlayerInfo) -> Vec<Effect> {
        let id = player.id;
        self.directory.connect(player);
        self.send(MatchEvent::PlayerConnected { player: id })
    }

    pub fn disconnect(&mut self, id: PlayerId) -> Vec<Effect> {
        let name = self
            .directory
            .disconnect(id)
            .map(|p| p.name)
            .unwrap_or_default();
        self.send(MatchEvent::PlayerDisconnected { player: id, name })
    }

    pub fn directory_players(&self) -> Vec<PlayerInfo> {
        use mix_scrims::PlayerDirectory;
        self.directory.connected_players()
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    pub fn broadcasts(&self) -> Vec<Notice> {
        self.log
            .iter()
            .filter_map(|e| match e {
                Effect::Broadcast { notice } => Some(notice.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn has_broadcast(&self, notice: &Notice) -> bool {
        self.broadcasts().iter().any(|n| n == notice)
    }

    pub fn count_kind(&self, kind: &str) -> usize {
        self.log.iter().filter(|e| e.kind() == kind).count()
    }

    /// Open draft prompt as (captain, pool), latest first
    pub fn draft_prompt(&self) -> Option<(PlayerId, Vec<PlayerId>)> {
        self.log.iter().rev().find_map(|e| match e {
            Effect::OpenMenu {
                player,
                menu: Menu::DraftPick { pool, .. },
            } => Some((*player, pool.iter().map(|p| p.id).collect())),
            _ => None,
        })
    }

    /// Answer draft prompts with the first pooled player until the draft ends
    pub fn run_draft(&mut self) {
        for _ in 0..64 {
            if self.phase() != MatchPhase::PickingTeam {
                return;
            }
            let Some((captain, pool)) = self.draft_prompt() else {
                // bot captains pick on the next tick
                self.wait(0);
                continue;
            };
            let Some(pick) = pool.first().copied() else {
                break;
            };
            self.clear_log();
            self.select(captain, MenuSelection::DraftPick { player: pick });
        }
    }

    /// Warmup to PickingTeam through readiness, the vote and the map load
    pub fn into_draft(&mut self, map: &str) {
        self.ready_all();
        assert_eq!(self.phase(), MatchPhase::MapVoting);
        let voters: Vec<PlayerId> = self.directory_players().iter().map(|p| p.id).collect();
        for id in voters {
            self.vote_map(id, map);
        }
        self.wait(30);
        self.wait(5);
        assert_eq!(self.phase(), MatchPhase::MapChosen);
        self.wait(60);
        self.clear_log();
        self.ready_all();
    }

    /// Knife round won by `winner`, whose captain answers with `choice`
    pub fn finish_knife_round(&mut self, winner: Team, choice: SideChoice) {
        assert_eq!(self.phase(), MatchPhase::KnifeRound);
        self.send(MatchEvent::RoundEnded { winner });
        if let Some(captain) = self.orchestrator.side_decider().map(|c| c.id) {
            self.select(captain, MenuSelection::Side { choice });
        }
        self.wait(1);
        assert_eq!(self.phase(), MatchPhase::Match);
    }

    /// Skip straight to a live match from the current slots
    pub fn into_match(&mut self) {
        self.console("mix_start");
        self.finish_knife_round(Team::CT, SideChoice::Stay);
        self.clear_log();
    }

    /// Play out the match end and the reset that follows
    pub fn end_match(&mut self) {
        self.send(MatchEvent::MatchEnded);
        self.wait(10);
        self.wait(5);
    }

    pub fn map(name: &str, display: &str) -> MapEntry {
        MapEntry::standard(name, display)
    }
}
