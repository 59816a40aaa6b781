//! Connects, disconnects and team change review

use super::MatchOrchestrator;
use crate::match_flow::actions::ScheduledAction;
use crate::match_flow::effects::{Effect, EngineCommand, Notice};
use crate::match_flow::phase::MatchPhase;
use crate::match_flow::recovery::{DisconnectRecovery, RecoveryInput, RepairIntent};
use crate::match_flow::timings::AUTO_ASSIGN_DELAY;
use crate::roster::{CaptainSelector, RosterStage};
use crate::scheduler::TaskScope;
use crate::types::{PlayerId, PlayerRef, SideChoice, Team};
use crate::utils::format_punishment_command;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Answer to a team join attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum TeamChangeVerdict {
    Allow,
    Block { reason: String },
}

impl TeamChangeVerdict {
    fn block(reason: impl Into<String>) -> Self {
        TeamChangeVerdict::Block {
            reason: reason.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, TeamChangeVerdict::Allow)
    }
}

impl MatchOrchestrator {
    /// Review a player's request to join `requested`.
    ///
    /// Allowed joins into a fixed-team phase update the playing rosters. A
    /// blocked join emits [`Effect::BlockTeamChange`] and tells the player why.
    pub fn review_team_change(&mut self, player: PlayerId, requested: Team) -> TeamChangeVerdict {
        let verdict = self.team_change_verdict(player, requested);
        if let TeamChangeVerdict::Block { reason } = &verdict {
            debug!(
                "Team change blocked - player: {}, requested: {}, reason: {}",
                player, requested, reason
            );
            self.emit(Effect::BlockTeamChange { player, requested });
            self.tell(
                player,
                Notice::TeamChangeBlocked {
                    reason: reason.clone(),
                },
            );
        }
        verdict
    }

    fn team_change_verdict(&mut self, player: PlayerId, requested: Team) -> TeamChangeVerdict {
        let Some(info) = self.directory.player(player) else {
            return TeamChangeVerdict::Allow;
        };
        if info.is_bot || self.moving_players || self.phase.allows_free_team_changes() {
            return TeamChangeVerdict::Allow;
        }

        let captain_of = self.draft.captain_team(player);
        match self.phase {
            MatchPhase::PickingTeam => {
                if requested == Team::Spectator && captain_of.is_none() {
                    return TeamChangeVerdict::Allow;
                }
                match self.draft.team_of(RosterStage::Picked, player) {
                    Some(team) if team == requested => TeamChangeVerdict::Allow,
                    Some(_) => TeamChangeVerdict::block("you were picked for the other team"),
                    None => TeamChangeVerdict::block("wait to be picked by a captain"),
                }
            }
            phase if phase.has_fixed_teams() => {
                if phase == MatchPhase::KnifeRound && captain_of.is_some() {
                    return TeamChangeVerdict::block("captains cannot change team now");
                }
                if let Some(own) = captain_of {
                    if own != requested {
                        return TeamChangeVerdict::block("captains must stay with their team");
                    }
                    return TeamChangeVerdict::Allow;
                }
                if requested == Team::Spectator {
                    if let Some(team) = self.draft.remove(RosterStage::Playing, player) {
                        info!("Player {} left the {} roster for spectator", player, team);
                    }
                    return TeamChangeVerdict::Allow;
                }
                if self
                    .draft
                    .playing(requested)
                    .iter()
                    .any(|p| p.id == player)
                {
                    return TeamChangeVerdict::Allow;
                }
                if self.draft.playing(requested).len() < self.settings.team_size() {
                    self.draft
                        .add(RosterStage::Playing, requested, info.to_ref());
                    info!("Player '{}' joined the {} roster", info.name, requested);
                    return TeamChangeVerdict::Allow;
                }
                TeamChangeVerdict::block(format!("{} is full", requested))
            }
            phase => TeamChangeVerdict::block(format!("teams are locked during {}", phase)),
        }
    }

    pub(super) fn on_player_connected(&mut self, player: PlayerId) {
        if let Some(token) = self.punishments.remove(&player) {
            self.timeline.cancel(token);
            info!("Player {} reconnected, leave punishment cancelled", player);
        }
        if matches!(self.phase, MatchPhase::Reset | MatchPhase::Ended) {
            return;
        }
        self.schedule(
            AUTO_ASSIGN_DELAY,
            TaskScope::Session,
            ScheduledAction::AutoAssignTeam { player },
        );
    }

    /// Place a freshly connected player on the team the phase calls for
    pub(super) fn auto_assign_team(&mut self, player: PlayerId) {
        let Some(info) = self.directory.player(player) else {
            return;
        };
        if info.is_bot {
            return;
        }
        let target = match self.phase {
            phase if phase.has_fixed_teams() => self
                .draft
                .team_of(RosterStage::Playing, player)
                .unwrap_or(Team::Spectator),
            MatchPhase::PickingTeam => self
                .draft
                .team_of(RosterStage::Picked, player)
                .unwrap_or(Team::Spectator),
            phase if phase.allows_free_team_changes() || phase == MatchPhase::MapLoading => {
                if info.team != Team::Spectator {
                    return;
                }
                let ct = self.directory.players_on(Team::CT).len();
                let t = self.directory.players_on(Team::T).len();
                if t < ct {
                    Team::T
                } else {
                    Team::CT
                }
            }
            _ => return,
        };
        if info.team != target {
            debug!("Auto-assigning '{}' to {}", info.name, target);
            self.move_player(player, target);
        }
    }

    pub(super) fn on_player_disconnected(&mut self, departed: PlayerRef) {
        let side_decider = self
            .side_decider
            .as_ref()
            .filter(|_| !self.side_decided)
            .map(|c| c.id);
        let plan = DisconnectRecovery::plan(
            RecoveryInput {
                phase: self.phase,
                draft: &self.draft,
                ready: &self.ready,
                timeouts: &self.timeouts,
                side_decider,
                punishment: &self.punishment,
            },
            &departed,
        );
        info!(
            "Player disconnected - '{}' ({}), phase: {}, repairs: {:?}",
            departed.name, departed.id, self.phase, plan.intents
        );
        self.draft = plan.draft;
        self.ready = plan.ready;
        if plan
            .intents
            .iter()
            .any(|intent| *intent != RepairIntent::ReevaluateReadiness)
        {
            self.stats.disconnect_repairs += 1;
        }

        for intent in plan.intents {
            self.apply_repair(&departed, intent);
        }
    }

    fn apply_repair(&mut self, departed: &PlayerRef, intent: RepairIntent) {
        match intent {
            RepairIntent::RestartDraft { team } => {
                warn!("Captain of {} left during the draft, restarting it", team);
                self.restart_draft(team);
            }
            RepairIntent::PromoteCaptain { team } => {
                let promoted = CaptainSelector::promote(
                    &mut self.draft,
                    team,
                    departed.id,
                    self.directory.as_ref(),
                    self.phase.captain_stage(),
                    &mut self.rng,
                );
                match promoted {
                    Some(captain) => {
                        self.broadcast(Notice::CaptainPromoted {
                            team,
                            name: captain.name,
                        });
                        if self.phase.has_fixed_teams() {
                            self.announce_team_names();
                        }
                    }
                    None => warn!("No replacement captain for {}", team),
                }
            }
            RepairIntent::DefaultSideChoice => {
                if !self.side_decided {
                    info!("Side decider '{}' left, keeping sides", departed.name);
                    self.decide_side(departed.clone(), SideChoice::Stay);
                }
            }
            RepairIntent::DropTimeoutBallot => {
                if let Some(outcome) = self.timeouts.drop_voter(departed.id) {
                    self.on_timeout_vote_closed(outcome);
                }
            }
            RepairIntent::SchedulePunishment { player, delay } => {
                let id = player.id;
                let token = self.schedule(
                    delay,
                    TaskScope::Detached,
                    ScheduledAction::ApplyLeavePunishment { player },
                );
                if let Some(previous) = self.punishments.insert(id, token) {
                    self.timeline.cancel(previous);
                }
            }
            RepairIntent::ReevaluateReadiness => self.check_readiness(),
        }
    }

    pub(super) fn apply_leave_punishment(&mut self, player: PlayerRef) {
        self.punishments.remove(&player.id);
        if self.directory.is_connected(player.id) {
            debug!("'{}' is back, no punishment", player.name);
            return;
        }
        let command = format_punishment_command(
            &self.punishment.server_command,
            player.id,
            &self.punishment.ban_reason,
            self.punishment.ban_duration_minutes,
        );
        warn!(
            "Punishing '{}' ({}) for leaving - command: {}",
            player.name, player.id, command
        );
        self.engine(EngineCommand::Server { command });
    }
}

#[cfg(test)]
mod tests {
    use super::TeamChangeVerdict;
    use crate::config::AppConfig;
    use crate::match_flow::{Effect, EngineCommand, MatchEvent, MatchOrchestrator, MatchPhase, Notice};
    use crate::players::InMemoryPlayerDirectory;
    use crate::types::{PlayerInfo, SideChoice, Team};
    use std::sync::Arc;
    use std::time::Duration;

    /// 1,3 on CT, 2,4 on T, 5 spectating; captains 1 and 2
    fn setup(config: AppConfig) -> (MatchOrchestrator, Arc<InMemoryPlayerDirectory>) {
        let directory = Arc::new(InMemoryPlayerDirectory::with_players((1..=5).map(|id| {
            let team = match id {
                5 => Team::Spectator,
                id if id % 2 == 1 => Team::CT,
                _ => Team::T,
            };
            PlayerInfo::human(id, format!("p{}", id), team)
        })));
        let mut orchestrator = MatchOrchestrator::with_seed(&config, directory.clone(), 5);
        orchestrator.assign_captain(Team::CT, 1).unwrap();
        orchestrator.assign_captain(Team::T, 2).unwrap();
        orchestrator.take_effects();
        (orchestrator, directory)
    }

    fn config() -> AppConfig {
        let mut config = AppConfig::with_defaults();
        config.mix.minimum_ready_players = 4;
        config
    }

    fn into_match(orchestrator: &mut MatchOrchestrator) {
        orchestrator.force_start("Console").unwrap();
        orchestrator.handle(MatchEvent::RoundEnded { winner: Team::CT });
        orchestrator.choose_side(1, SideChoice::Stay).unwrap();
        orchestrator.advance(Duration::from_secs(1));
        assert_eq!(orchestrator.phase(), MatchPhase::Match);
        orchestrator.take_effects();
    }

    #[test]
    fn test_knife_round_team_changes() {
        let (mut orchestrator, _directory) = setup(config());
        orchestrator.force_start("Console").unwrap();
        assert_eq!(orchestrator.phase(), MatchPhase::KnifeRound);
        orchestrator.take_effects();

        assert!(!orchestrator.review_team_change(1, Team::T).is_allowed());
        assert!(orchestrator
            .take_effects()
            .contains(&Effect::BlockTeamChange {
                player: 1,
                requested: Team::T
            }));

        assert_eq!(
            orchestrator.review_team_change(5, Team::CT),
            TeamChangeVerdict::Block {
                reason: "CT is full".to_string()
            }
        );
        assert!(orchestrator.review_team_change(3, Team::Spectator).is_allowed());
        assert_eq!(orchestrator.draft().playing(Team::CT).len(), 1);
        assert!(orchestrator.review_team_change(5, Team::CT).is_allowed());
        assert!(orchestrator
            .draft()
            .playing(Team::CT)
            .iter()
            .any(|p| p.id == 5));
        assert!(!orchestrator.review_team_change(4, Team::CT).is_allowed());
        assert!(orchestrator.draft().is_consistent());
    }

    #[test]
    fn test_free_phase_allows_everything() {
        let (mut orchestrator, _directory) = setup(config());
        assert_eq!(orchestrator.phase(), MatchPhase::Warmup);
        assert!(orchestrator.review_team_change(1, Team::T).is_allowed());
        assert!(orchestrator.review_team_change(5, Team::CT).is_allowed());
        assert!(orchestrator.take_effects().is_empty());
    }

    #[test]
    fn test_captain_promoted_after_disconnect() {
        let (mut orchestrator, directory) = setup(config());
        orchestrator.force_start("Console").unwrap();
        directory.disconnect(1);
        let effects = orchestrator.handle(MatchEvent::PlayerDisconnected {
            player: 1,
            name: "p1".to_string(),
        });
        assert!(effects.contains(&Effect::Broadcast {
            notice: Notice::CaptainPromoted {
                team: Team::CT,
                name: "p3".to_string()
            }
        }));
        assert_eq!(orchestrator.draft().captain(Team::CT).unwrap().id, 3);
        assert_eq!(orchestrator.stats().disconnect_repairs, 1);
    }

    #[test]
    fn test_leave_punishment_unless_reconnected() {
        let mut config = config();
        config.punishment.enabled = true;
        config.punishment.sensitivity = 0;
        let (mut orchestrator, directory) = setup(config);
        into_match(&mut orchestrator);

        let leaver = directory.disconnect(4).unwrap();
        orchestrator.handle(MatchEvent::PlayerDisconnected {
            player: 4,
            name: leaver.name.clone(),
        });
        directory.disconnect(3);
        orchestrator.handle(MatchEvent::PlayerDisconnected {
            player: 3,
            name: "p3".to_string(),
        });
        directory.connect(PlayerInfo::human(3, "p3", Team::Spectator));
        orchestrator.handle(MatchEvent::PlayerConnected { player: 3 });

        let effects = orchestrator.advance(Duration::from_secs(300));
        let sanctions: Vec<&EngineCommand> = effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Engine {
                    command: command @ EngineCommand::Server { .. },
                } => Some(command),
                _ => None,
            })
            .collect();
        assert_eq!(
            sanctions,
            vec![&EngineCommand::Server {
                command: "sw_ban 4 Leaving during a mix 15".to_string()
            }]
        );
    }

    #[test]
    fn test_connecting_player_is_balanced() {
        let (mut orchestrator, directory) = setup(config());
        directory.connect(PlayerInfo::human(6, "p6", Team::Spectator));
        orchestrator.handle(MatchEvent::PlayerConnected { player: 6 });
        let effects = orchestrator.advance(Duration::from_secs(2));
        assert!(effects.contains(&Effect::MovePlayer {
            player: 6,
            team: Team::CT
        }));

        directory.set_team(6, Team::CT);
        directory.connect(PlayerInfo::human(7, "p7", Team::Spectator));
        orchestrator.handle(MatchEvent::PlayerConnected { player: 7 });
        let effects = orchestrator.advance(Duration::from_secs(2));
        assert!(effects.contains(&Effect::MovePlayer {
            player: 7,
            team: Team::T
        }));
    }
}
