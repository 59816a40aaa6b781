//! Captains, the team draft, the knife round and the starting side pick

use super::MatchOrchestrator;
use crate::error::{MatchError, MatchResult};
use crate::match_flow::actions::ScheduledAction;
use crate::match_flow::decider::{decider_for, Decision};
use crate::match_flow::effects::{EngineCommand, Menu, Notice};
use crate::match_flow::phase::MatchPhase;
use crate::match_flow::timings::SIDE_CHOICE_DELAY;
use crate::roster::{CaptainSelector, RosterStage};
use crate::scheduler::TaskScope;
use crate::types::{Issuer, PlayerId, PlayerInfo, PlayerRef, SideChoice, Team};
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, error, info, warn};

impl MatchOrchestrator {
    /// Seat `player` as captain of `team`
    pub fn assign_captain(&mut self, team: Team, player: PlayerId) -> MatchResult<PlayerRef> {
        if !self.phase.allows_captain_assignment() {
            return Err(MatchError::invalid_state("captain", self.phase));
        }
        let info = self
            .directory
            .player(player)
            .ok_or(MatchError::PlayerNotFound { player_id: player })?;
        let captain =
            CaptainSelector::assign(&mut self.draft, team, &info, self.phase.captain_stage())?;
        self.broadcast(Notice::CaptainAssigned {
            team,
            name: captain.name.clone(),
        });
        if info.team != team {
            self.move_player(info.id, team);
        }
        Ok(captain)
    }

    /// A player claims an empty captain slot
    pub fn volunteer_captain(&mut self, player: PlayerId, team: Team) -> MatchResult<PlayerRef> {
        if !self.phase.allows_captain_assignment() {
            return Err(MatchError::invalid_state("volunteer_captain", self.phase));
        }
        if self.draft.captain(team).is_some() {
            return Err(MatchError::CaptainSlotTaken { team });
        }
        self.assign_captain(team, player)
    }

    /// `captain <t|ct> [player]`: without a player the issuer gets a menu
    pub(super) fn captain_command(
        &mut self,
        issuer: &Issuer,
        team: Team,
        player: Option<&str>,
    ) -> MatchResult<()> {
        if !self.phase.allows_captain_assignment() {
            return Err(MatchError::invalid_state("captain", self.phase));
        }
        match player {
            Some(query) => {
                let candidate = self.find_player(query)?;
                self.assign_captain(team, candidate.id).map(|_| ())
            }
            None => {
                let admin = issuer.player_id().ok_or_else(|| {
                    MatchError::invalid_argument("name a player when assigning from the console")
                })?;
                let pool = CaptainSelector::eligible_pool(&self.draft, team, self.directory.as_ref())
                    .iter()
                    .map(PlayerInfo::to_ref)
                    .collect();
                self.open_menu(admin, Menu::CaptainPick { team, pool });
                Ok(())
            }
        }
    }

    /// Resolve a player by id, exact name, then unique partial name
    fn find_player(&self, query: &str) -> MatchResult<PlayerInfo> {
        let query = query.trim();
        let players = self.directory.connected_players();
        if let Ok(id) = query.parse::<PlayerId>() {
            if let Some(player) = players.iter().find(|p| p.id == id) {
                return Ok(player.clone());
            }
        }
        if let Some(player) = players.iter().find(|p| p.name.eq_ignore_ascii_case(query)) {
            return Ok(player.clone());
        }
        let needle = query.to_lowercase();
        let partial: Vec<&PlayerInfo> = players
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .collect();
        match partial.as_slice() {
            [only] => Ok((*only).clone()),
            [] => Err(MatchError::invalid_argument(format!(
                "no player matches '{}'",
                query
            ))),
            _ => Err(MatchError::invalid_argument(format!(
                "'{}' matches more than one player",
                query
            ))),
        }
    }

    pub(super) fn start_team_picking(&mut self) {
        if self.settings.skip_team_picking {
            info!("Team picking skipped, taking teams from the current slots");
            self.start_knife_round();
            return;
        }

        for team in Team::PLAYING {
            if let Err(err) = CaptainSelector::ensure(
                &mut self.draft,
                team,
                self.directory.as_ref(),
                RosterStage::Picked,
                &mut self.rng,
            ) {
                self.abort_captain_selection(err);
                return;
            }
        }

        self.set_phase(MatchPhase::PickingTeam);
        if let Some(task) = self.ready_status_task.take() {
            self.timeline.cancel(task);
        }
        self.engine(EngineCommand::PauseMatch);
        self.exec_config("teampick.cfg");
        self.begin_draft();
    }

    fn abort_captain_selection(&mut self, err: MatchError) {
        error!("Captain selection failed, resetting - {}", err);
        self.broadcast(Notice::CaptainSelectionFailed {
            reason: err.to_string(),
        });
        self.request_reset();
    }

    /// Clear the picks, seat everyone, flip for first pick and prompt
    fn begin_draft(&mut self) {
        self.draft.clear_picks();
        for player in self.directory.connected_players() {
            let target = self
                .draft
                .team_of(RosterStage::Picked, player.id)
                .unwrap_or(Team::Spectator);
            if player.team != target {
                self.move_player(player.id, target);
            }
        }
        self.announce_team_names();

        let first = if self.rng.gen_bool(0.5) {
            Team::CT
        } else {
            Team::T
        };
        let captain = self
            .draft
            .captain(first)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        info!("Team picking started - first pick: {} ({})", first, captain);
        self.broadcast(Notice::TeamPickingStarted { first, captain });
        self.prompt_pick(first);
    }

    /// Hand the turn to `team`'s captain. An empty pool ends the draft.
    fn prompt_pick(&mut self, team: Team) {
        let connected = self.directory.connected_players();
        let pool = self.draft.remaining_pool(&connected);
        if pool.is_empty() {
            info!("Draft pool exhausted after {} picks", self.draft.picked_total());
            self.start_knife_round();
            return;
        }

        let captain = self
            .draft
            .captain(team)
            .and_then(|c| connected.iter().find(|p| p.id == c.id))
            .cloned();
        let Some(captain) = captain else {
            warn!("No connected captain for {} at their turn", team);
            self.restart_draft(team);
            return;
        };

        self.draft.set_turn(Some(team));
        match decider_for(captain.is_bot).pick_player(&pool, &mut self.rng) {
            Decision::Now(player) => {
                debug!("Bot captain '{}' will pick '{}'", captain.name, player.name);
                self.schedule(
                    Duration::ZERO,
                    TaskScope::Phase,
                    ScheduledAction::BotDraftPick {
                        captain: captain.id,
                        player: player.id,
                    },
                );
            }
            Decision::Prompt => {
                self.broadcast(Notice::PickTurn {
                    captain: captain.name.clone(),
                });
                self.open_menu(captain.id, Menu::DraftPick { team, pool });
            }
        }
    }

    /// Apply a captain's pick. An ineligible player answers the captain with
    /// an invalid-pick notice and a fresh prompt before the error returns.
    pub fn select_draft_pick(&mut self, captain: PlayerId, pick: PlayerId) -> MatchResult<()> {
        if self.phase != MatchPhase::PickingTeam {
            return Err(MatchError::invalid_state("pick", self.phase));
        }
        let turn = self.draft.turn().unwrap_or(Team::CT);
        let team = self
            .draft
            .captain_team(captain)
            .ok_or(MatchError::NotCaptain { team: turn })?;
        if self.draft.turn() != Some(team) {
            return Err(MatchError::NotYourTurn);
        }

        let connected = self.directory.connected_players();
        let pool = self.draft.remaining_pool(&connected);
        let Some(player) = pool.into_iter().find(|p| p.id == pick) else {
            self.tell(captain, Notice::InvalidPick);
            self.prompt_pick(team);
            return Err(MatchError::invalid_argument(format!(
                "player {} cannot be picked",
                pick
            )));
        };

        self.draft.add(RosterStage::Picked, team, player.clone());
        self.close_menu(captain);
        self.move_player(player.id, team);
        let captain_name = self
            .draft
            .captain(team)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        info!(
            "Player picked - captain: '{}', player: '{}', team: {}, picked: {}",
            captain_name,
            player.name,
            team,
            self.draft.picked_total()
        );
        self.broadcast(Notice::PlayerPicked {
            captain: captain_name,
            player: player.name,
            team,
        });

        if self.draft.picked_total() >= self.settings.minimum_ready_players {
            self.start_knife_round();
        } else {
            self.prompt_pick(team.opposite());
        }
        Ok(())
    }

    /// A drafting captain left: seat a replacement and start over
    pub(super) fn restart_draft(&mut self, team: Team) {
        warn!("Restarting team picking - {} lost its captain", team);
        self.close_captain_menus();
        match CaptainSelector::replace_for_draft(
            &mut self.draft,
            team,
            self.directory.as_ref(),
            &mut self.rng,
        ) {
            Ok(captain) => self.broadcast(Notice::CaptainPromoted {
                team,
                name: captain.name,
            }),
            Err(err) => {
                self.abort_captain_selection(err);
                return;
            }
        }
        self.set_phase(MatchPhase::PickingTeam);
        self.begin_draft();
    }

    /// Match rosters from the live team slots, capped at the team size,
    /// with a random captain per side
    fn assign_teams_from_slots(&mut self) {
        let team_size = self.settings.team_size().max(1);
        let mut rosters: Vec<Vec<PlayerRef>> = Vec::with_capacity(2);
        for team in Team::PLAYING {
            let roster: Vec<PlayerRef> = self
                .directory
                .players_on(team)
                .iter()
                .take(team_size)
                .map(PlayerInfo::to_ref)
                .collect();
            rosters.push(roster);
        }
        let t = rosters.pop().unwrap_or_default();
        let ct = rosters.pop().unwrap_or_default();
        self.draft.set_playing(ct, t);

        for team in Team::PLAYING {
            let keep = self
                .draft
                .captain(team)
                .is_some_and(|c| self.draft.playing(team).iter().any(|p| p.id == c.id));
            if keep {
                continue;
            }
            let captain = self.draft.playing(team).choose(&mut self.rng).cloned();
            if captain.is_none() {
                warn!("No players on {} to captain the team", team);
            }
            self.draft.set_captain(team, captain);
        }
        info!(
            "Teams taken from slots - ct: {}, t: {}",
            self.draft.playing(Team::CT).len(),
            self.draft.playing(Team::T).len()
        );
    }

    fn close_captain_menus(&mut self) {
        let captains: Vec<PlayerId> = Team::PLAYING
            .iter()
            .filter_map(|team| self.draft.captain(*team).map(|c| c.id))
            .collect();
        for captain in captains {
            self.close_menu(captain);
        }
    }

    pub(super) fn start_knife_round(&mut self) {
        self.close_captain_menus();
        // outside a running draft the live team slots are authoritative
        if self.phase == MatchPhase::PickingTeam && self.draft.picked_total() > 0 {
            self.draft.promote_picked_to_playing();
        } else {
            self.assign_teams_from_slots();
        }
        self.draft.set_turn(None);
        self.ready.clear();

        self.set_phase(MatchPhase::KnifeRound);
        if let Some(task) = self.ready_status_task.take() {
            self.timeline.cancel(task);
        }
        self.move_to_rosters();
        self.announce_team_names();
        self.engine(EngineCommand::UnpauseMatch);
        self.exec_config("knife_round.cfg");
        info!(
            "Knife round started - ct: {}, t: {}",
            self.draft.playing(Team::CT).len(),
            self.draft.playing(Team::T).len()
        );
        self.broadcast(Notice::KnifeRoundStarted);
    }

    /// Admin override: go straight to the knife round from any phase
    pub fn force_start(&mut self, by: &str) -> MatchResult<()> {
        info!("Force start by {} during {}", by, self.phase);
        self.broadcast(Notice::ForceStart { by: by.to_string() });
        for player in self.humans() {
            self.close_menu(player);
        }
        self.timeouts.reset();
        self.side_decider = None;
        self.side_decided = false;
        self.start_knife_round();
        Ok(())
    }

    pub(super) fn on_round_ended(&mut self, winner: Team) {
        if self.phase != MatchPhase::KnifeRound {
            return;
        }
        if !winner.is_playing() {
            warn!("Knife round ended without a winning side");
            return;
        }

        let stale = self.draft.captain(winner).cloned();
        let seated = stale.as_ref().and_then(|c| self.directory.refresh(c));
        let captain = match seated {
            Some(captain) => Some(captain),
            None => CaptainSelector::promote(
                &mut self.draft,
                winner,
                stale.map(|c| c.id).unwrap_or_default(),
                self.directory.as_ref(),
                RosterStage::Playing,
                &mut self.rng,
            ),
        };

        self.set_phase(MatchPhase::PickingStartingSide);
        self.engine(EngineCommand::PauseMatch);
        self.knife_winner = Some(winner);
        self.side_decider = captain.clone();
        self.side_decided = false;
        info!(
            "Knife round won - team: {}, captain: {:?}",
            winner,
            captain.as_ref().map(|c| c.name.as_str())
        );
        self.broadcast(Notice::KnifeRoundWon {
            team: winner,
            captain: captain.as_ref().map(|c| c.name.clone()),
        });

        let Some(captain) = captain else {
            warn!("Nobody left to choose a side for {}, keeping sides", winner);
            self.start_match();
            return;
        };
        let is_bot = self
            .directory
            .player(captain.id)
            .is_some_and(|p| p.is_bot);
        match decider_for(is_bot).choose_side() {
            Decision::Now(choice) => self.decide_side(captain, choice),
            Decision::Prompt => {
                self.broadcast(Notice::WaitingForSideChoice {
                    captain: captain.name.clone(),
                });
                self.open_menu(captain.id, Menu::SidePick);
            }
        }
    }

    /// Stay or switch, by the knife round winner's captain only
    pub fn choose_side(&mut self, player: PlayerId, choice: SideChoice) -> MatchResult<()> {
        if self.phase != MatchPhase::PickingStartingSide {
            return Err(MatchError::invalid_state(choice.to_string(), self.phase));
        }
        let decider = self
            .side_decider
            .clone()
            .ok_or_else(|| MatchError::invalid_state(choice.to_string(), self.phase))?;
        if decider.id != player {
            return Err(MatchError::NotCaptain {
                team: self.knife_winner.unwrap_or(Team::CT),
            });
        }
        if self.side_decided {
            return Err(MatchError::AlreadyDecided);
        }
        self.decide_side(decider, choice);
        Ok(())
    }

    pub(super) fn decide_side(&mut self, captain: PlayerRef, choice: SideChoice) {
        self.side_decided = true;
        self.close_menu(captain.id);
        info!("Side chosen - captain: '{}', choice: {}", captain.name, choice);
        self.broadcast(Notice::SideChosen {
            captain: captain.name.clone(),
            choice,
        });
        self.schedule(
            SIDE_CHOICE_DELAY,
            TaskScope::Phase,
            ScheduledAction::ApplySideChoice { captain, choice },
        );
    }

    pub(super) fn apply_side_choice(&mut self, captain: &PlayerRef, choice: SideChoice) {
        debug!("Applying side choice {} from '{}'", choice, captain.name);
        if choice == SideChoice::Switch {
            self.draft.swap_sides();
        }
        self.start_match();
    }
}

#[cfg(test)]
mod tests {
    use crate::config::AppConfig;
    use crate::error::MatchError;
    use crate::match_flow::{Effect, MatchOrchestrator, MatchPhase, Menu};
    use crate::players::InMemoryPlayerDirectory;
    use crate::roster::RosterStage;
    use crate::types::{PlayerInfo, SideChoice, Team};
    use std::sync::Arc;
    use std::time::Duration;

    fn setup(bots: bool) -> MatchOrchestrator {
        let mut config = AppConfig::with_defaults();
        config.mix.minimum_ready_players = 4;
        let directory = Arc::new(InMemoryPlayerDirectory::with_players((1..=4).map(|id| {
            let team = if id % 2 == 1 { Team::CT } else { Team::T };
            if bots && id > 1 {
                PlayerInfo::bot(id, format!("bot{}", id), team)
            } else {
                PlayerInfo::human(id, format!("p{}", id), team)
            }
        })));
        MatchOrchestrator::with_seed(&config, directory, 11)
    }

    /// Drive a fresh orchestrator into PickingTeam through the normal flow
    fn into_picking(orchestrator: &mut MatchOrchestrator) {
        for id in 1..=4 {
            orchestrator.mark_ready(id).unwrap();
        }
        orchestrator.advance(Duration::from_secs(30));
        let map = orchestrator.vote_options()[0].name.clone();
        orchestrator.advance(Duration::from_secs(5));
        orchestrator.handle(crate::match_flow::MatchEvent::MapStarted { map });
        for id in 1..=4 {
            orchestrator.mark_ready(id).unwrap();
        }
    }

    #[test]
    fn test_draft_alternates_and_ends_in_knife_round() {
        let mut orchestrator = setup(false);
        into_picking(&mut orchestrator);
        assert_eq!(orchestrator.phase(), MatchPhase::PickingTeam);

        let effects = orchestrator.take_effects();
        let (captain, pool) = effects
            .iter()
            .find_map(|e| match e {
                Effect::OpenMenu {
                    player,
                    menu: Menu::DraftPick { pool, .. },
                } => Some((*player, pool.clone())),
                _ => None,
            })
            .expect("a captain is prompted");
        assert_eq!(pool.len(), 2);

        assert_eq!(
            orchestrator.select_draft_pick(captain, 99),
            Err(MatchError::invalid_argument("player 99 cannot be picked"))
        );
        orchestrator.select_draft_pick(captain, pool[0].id).unwrap();
        assert!(matches!(
            orchestrator.select_draft_pick(captain, pool[1].id),
            Err(MatchError::NotYourTurn)
        ));

        let other = orchestrator
            .draft()
            .captain(orchestrator.draft().turn().unwrap())
            .unwrap()
            .id;
        orchestrator.select_draft_pick(other, pool[1].id).unwrap();
        assert_eq!(orchestrator.phase(), MatchPhase::KnifeRound);
        assert_eq!(orchestrator.draft().playing_total(), 4);
        assert!(orchestrator.draft().is_consistent());
    }

    #[test]
    fn test_bot_captains_pick_on_next_tick() {
        let mut orchestrator = setup(true);
        orchestrator.assign_captain(Team::CT, 2).unwrap();
        orchestrator.assign_captain(Team::T, 3).unwrap();
        into_picking(&mut orchestrator);
        assert_eq!(orchestrator.phase(), MatchPhase::PickingTeam);

        orchestrator.advance(Duration::ZERO);
        assert_eq!(orchestrator.phase(), MatchPhase::KnifeRound);
        assert_eq!(orchestrator.draft().playing(Team::CT).len(), 2);
        assert_eq!(orchestrator.draft().playing(Team::T).len(), 2);
    }

    #[test]
    fn test_side_choice_is_winner_only_and_once() {
        let mut orchestrator = setup(false);
        orchestrator.force_start("Console").unwrap();
        assert_eq!(orchestrator.phase(), MatchPhase::KnifeRound);
        // without a draft the rosters come from the team slots
        assert_eq!(orchestrator.draft().playing(Team::CT).len(), 2);
        assert_eq!(orchestrator.draft().playing(Team::T).len(), 2);
        assert!(orchestrator.draft().both_captains_assigned());

        let mut orchestrator = setup(false);
        orchestrator.assign_captain(Team::CT, 1).unwrap();
        orchestrator.assign_captain(Team::T, 2).unwrap();
        orchestrator.force_start("Console").unwrap();
        assert_eq!(
            orchestrator.draft().playing(Team::CT)[0].id,
            1,
            "assigned captains keep their seats"
        );
        orchestrator.handle(crate::match_flow::MatchEvent::RoundEnded { winner: Team::T });
        assert_eq!(orchestrator.phase(), MatchPhase::PickingStartingSide);

        assert!(matches!(
            orchestrator.choose_side(1, SideChoice::Stay),
            Err(MatchError::NotCaptain { team: Team::T })
        ));
        orchestrator.choose_side(2, SideChoice::Switch).unwrap();
        assert_eq!(
            orchestrator.choose_side(2, SideChoice::Stay),
            Err(MatchError::AlreadyDecided)
        );

        orchestrator.advance(Duration::from_secs(1));
        assert_eq!(orchestrator.phase(), MatchPhase::Match);
        assert_eq!(orchestrator.draft().captain(Team::CT).unwrap().id, 2);
        assert_eq!(
            orchestrator.draft().team_of(RosterStage::Playing, 1),
            Some(Team::T)
        );
    }
}
