//! Readiness, map voting and map loading

use super::{map_options, MatchOrchestrator};
use crate::config::MapEntry;
use crate::error::{MatchError, MatchResult};
use crate::match_flow::actions::ScheduledAction;
use crate::match_flow::effects::{Effect, EngineCommand, Menu, Notice};
use crate::match_flow::phase::MatchPhase;
use crate::match_flow::timings::{
    CAPTAIN_SELECTION_DELAY, MAP_CHANGE_DELAY, MAP_LOADING_REANNOUNCE, OVERRIDES_CONFIG_DELAY,
    WARMUP_CONFIG_DELAY,
};
use crate::roster::{CaptainSelector, ReadyChange, ReadyRoster, RosterStage};
use crate::scheduler::TaskScope;
use crate::types::{Issuer, PlayerId, Team};
use crate::utils::format_cooldown;
use crate::voting::VoteChange;
use rand::seq::SliceRandom;
use tracing::{debug, error, info, warn};

impl MatchOrchestrator {
    fn required_ready(&self) -> usize {
        ReadyRoster::required(
            self.settings.minimum_ready_players,
            self.directory.connected_count(),
        )
    }

    pub fn mark_ready(&mut self, player: PlayerId) -> MatchResult<ReadyChange> {
        if !ReadyRoster::accepts_changes(self.phase) {
            return Err(MatchError::invalid_state("ready", self.phase));
        }
        let info = self
            .directory
            .player(player)
            .ok_or(MatchError::PlayerNotFound { player_id: player })?;
        let change = self.ready.mark_ready(self.phase, info.to_ref())?;
        match change {
            ReadyChange::Marked => {
                let required = self.required_ready();
                info!(
                    "Player ready - '{}' ({}), ready: {}/{}",
                    info.name,
                    info.id,
                    self.ready.len(),
                    required
                );
                self.broadcast(Notice::PlayerReady {
                    name: info.name,
                    ready: self.ready.len(),
                    required,
                });
                self.check_readiness();
            }
            _ => self.tell(player, Notice::AlreadyReady),
        }
        Ok(change)
    }

    pub fn mark_unready(&mut self, player: PlayerId) -> MatchResult<ReadyChange> {
        let change = self.ready.mark_unready(self.phase, player)?;
        match change {
            ReadyChange::Cleared => {
                let required = self.required_ready();
                self.broadcast(Notice::PlayerUnready {
                    name: self.player_name(player),
                    ready: self.ready.len(),
                    required,
                });
            }
            _ => self.tell(player, Notice::AlreadyUnready),
        }
        Ok(change)
    }

    /// Mark every connected player ready and advance
    pub fn force_ready(&mut self, by: &str) -> MatchResult<()> {
        if !ReadyRoster::accepts_changes(self.phase) {
            return Err(MatchError::invalid_state("forceready", self.phase));
        }
        info!("Force ready by {} during {}", by, self.phase);
        self.broadcast(Notice::ForceReady { by: by.to_string() });
        for player in self.directory.connected_players() {
            self.ready.mark_ready(self.phase, player.to_ref())?;
        }
        self.check_readiness();
        Ok(())
    }

    /// Advance out of Warmup or MapChosen once enough players are ready
    pub(super) fn check_readiness(&mut self) {
        if !ReadyRoster::accepts_changes(self.phase) {
            return;
        }
        let dropped = self.ready.retain_connected(self.directory.as_ref());
        if dropped > 0 {
            debug!("Dropped {} disconnected players from the ready list", dropped);
        }
        let connected = self.directory.connected_count();
        if !self
            .ready
            .threshold_met(self.settings.minimum_ready_players, connected)
        {
            return;
        }
        info!(
            "Ready threshold met - ready: {}, connected: {}, phase: {}",
            self.ready.len(),
            connected,
            self.phase
        );
        match self.phase {
            MatchPhase::Warmup => self.start_map_voting(),
            MatchPhase::MapChosen => self.start_team_picking(),
            _ => {}
        }
    }

    fn start_map_voting(&mut self) {
        let mut options = self.history.filter_available(self.catalog.voteable());
        if options.is_empty() {
            // everything voteable is cooling down
            options = self.catalog.voteable().cloned().collect();
        }
        if options.is_empty() {
            error!("No maps available for voting, check the map configuration");
            self.broadcast(Notice::NoMapsConfigured);
            self.request_reset();
            return;
        }
        options.shuffle(&mut self.rng);

        self.set_phase(MatchPhase::MapVoting);
        self.votes.clear();
        self.vote_options = options;
        info!(
            "Map voting started - options: {}",
            self.vote_options
                .iter()
                .map(|m| m.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let duration = self.settings.vote_duration();
        self.broadcast(Notice::MapVotingStarted {
            seconds: duration.as_secs(),
        });
        let menu = Menu::MapVote {
            options: map_options(&self.vote_options),
        };
        for player in self.humans() {
            self.open_menu(player, menu.clone());
        }
        self.schedule(duration, TaskScope::Phase, ScheduledAction::CloseMapVote);
    }

    /// Count a vote for a map on the current ballot, by engine or display name
    pub fn register_map_vote(&mut self, voter: PlayerId, query: &str) -> MatchResult<VoteChange> {
        if self.phase != MatchPhase::MapVoting {
            return Err(MatchError::invalid_state("map vote", self.phase));
        }
        if !self.directory.is_connected(voter) {
            return Err(MatchError::PlayerNotFound { player_id: voter });
        }
        let map = self
            .vote_options
            .iter()
            .find(|m| m.matches(query))
            .cloned()
            .ok_or_else(|| {
                MatchError::invalid_argument(format!("'{}' is not on the ballot", query.trim()))
            })?;

        let change = self.votes.register_vote(voter, &map);
        if change != VoteChange::Unchanged {
            self.stats.map_votes += 1;
        }
        self.close_menu(voter);
        self.tell(
            voter,
            Notice::VoteRegistered {
                map: map.display_name.clone(),
                votes: self.votes.votes_for(&map.name),
            },
        );
        Ok(change)
    }

    /// Reopen the vote menu for a player who closed it
    pub fn revote(&mut self, player: PlayerId) -> MatchResult<()> {
        if self.phase != MatchPhase::MapVoting {
            return Err(MatchError::invalid_state("revote", self.phase));
        }
        let menu = Menu::MapVote {
            options: map_options(&self.vote_options),
        };
        self.open_menu(player, menu);
        Ok(())
    }

    pub(super) fn close_map_vote(&mut self) {
        if self.phase != MatchPhase::MapVoting {
            return;
        }
        let resolution = self.votes.resolve(&self.vote_options, &mut self.rng);
        for player in self.humans() {
            self.close_menu(player);
        }
        let Some(resolution) = resolution else {
            error!("Map vote closed without any candidate maps");
            self.broadcast(Notice::NoMapsConfigured);
            self.request_reset();
            return;
        };

        self.set_phase(MatchPhase::MapChosen);
        let map = resolution.map;
        if resolution.random {
            self.broadcast(Notice::MapChosenRandom {
                map: map.display_name.clone(),
            });
        } else {
            self.broadcast(Notice::MapChosen {
                map: map.display_name.clone(),
                votes: resolution.votes,
            });
        }
        self.load_selected_map(map);
    }

    /// Announce, stop the demo and change level after a short delay.
    /// While a load of the same map is in flight this only re-announces.
    pub(super) fn load_selected_map(&mut self, map: MapEntry) {
        if self.phase == MatchPhase::MapLoading {
            if self
                .loading_map
                .as_ref()
                .is_some_and(|loading| loading.name == map.name)
            {
                self.broadcast(Notice::MapLoading {
                    map: map.display_name,
                });
                return;
            }
            // a different map replaces the change in flight
            self.epochs.bump_map();
        }

        info!(
            "Loading map - map: '{}', workshop: {}",
            map.name,
            map.workshop_target().unwrap_or("none")
        );
        self.broadcast(Notice::ChangingMap {
            map: map.display_name.clone(),
        });
        self.engine(EngineCommand::StopRecording);
        self.set_phase(MatchPhase::MapLoading);
        self.loading_map = Some(map.clone());
        self.schedule(
            MAP_CHANGE_DELAY,
            TaskScope::Map,
            ScheduledAction::ChangeLevel { map: map.clone() },
        );
        self.schedule(
            MAP_LOADING_REANNOUNCE,
            TaskScope::Map,
            ScheduledAction::MapLoadingReminder { map },
        );
    }

    pub(super) fn change_level(&mut self, map: &MapEntry) {
        let command = match map.workshop_target() {
            Some(workshop_id) => EngineCommand::WorkshopChangeLevel {
                map: map.name.clone(),
                workshop_id: workshop_id.to_string(),
            },
            None => EngineCommand::ChangeLevel {
                map: map.name.clone(),
            },
        };
        self.engine(command);
    }

    pub(super) fn remind_map_loading(&mut self, map: MapEntry) {
        let still_loading = self.phase == MatchPhase::MapLoading
            && self
                .loading_map
                .as_ref()
                .is_some_and(|loading| loading.name == map.name);
        if !still_loading {
            return;
        }
        self.broadcast(Notice::MapLoading {
            map: map.display_name.clone(),
        });
        self.schedule(
            MAP_LOADING_REANNOUNCE,
            TaskScope::Map,
            ScheduledAction::MapLoadingReminder { map },
        );
    }

    /// Admin map change, skipping the vote
    pub fn change_map(&mut self, by: &str, query: &str) -> MatchResult<()> {
        let map = self
            .catalog
            .find(query)
            .cloned()
            .ok_or_else(|| MatchError::invalid_argument(format!("map '{}' not found", query)))?;
        info!("Map changed by {} to '{}'", by, map.name);
        self.broadcast(Notice::GoToMap {
            by: by.to_string(),
            map: map.display_name.clone(),
        });
        self.load_selected_map(map);
        Ok(())
    }

    pub(super) fn list_maps(&mut self, issuer: &Issuer, all: bool) {
        let maps = if all {
            map_options(self.catalog.all())
        } else {
            let voteable: Vec<MapEntry> = self.catalog.voteable().cloned().collect();
            map_options(&voteable)
        };
        self.reply(issuer, Notice::MapListing { maps });
    }

    pub(super) fn on_map_started(&mut self, map: &str) {
        self.epochs.bump_map();
        let purged = self.timeline.purge_stale(&self.epochs);
        self.current_map = Some(map.to_string());
        self.freeze_time = false;
        info!(
            "Map started - map: '{}', phase: {}, purged tasks: {}",
            map, self.phase, purged
        );

        match self.phase {
            MatchPhase::MapLoading | MatchPhase::MapChosen => {
                self.ready.clear();
                self.loading_map = None;
                self.set_phase(MatchPhase::MapChosen);
                self.schedule(
                    WARMUP_CONFIG_DELAY,
                    TaskScope::Map,
                    ScheduledAction::LoadWarmupConfig,
                );
                self.schedule(
                    CAPTAIN_SELECTION_DELAY,
                    TaskScope::Map,
                    ScheduledAction::SelectCaptains,
                );
            }
            MatchPhase::Warmup => self.load_warmup_config(),
            phase => debug!("Map '{}' started during {}, nothing to do", map, phase),
        }
    }

    /// Warmup config, the override config a few seconds later, and the
    /// periodic announcements
    pub(super) fn load_warmup_config(&mut self) {
        self.exec_config("warmup.cfg");
        let overrides = if self.settings.test_mode {
            "staging_overrides.cfg"
        } else {
            "production_overrides.cfg"
        };
        self.schedule(
            OVERRIDES_CONFIG_DELAY,
            TaskScope::Map,
            ScheduledAction::ExecConfig {
                name: overrides.to_string(),
            },
        );
        self.start_announcements();
    }

    /// (Re)start the ready status and command reminder repeats
    fn start_announcements(&mut self) {
        if let Some(task) = self.ready_status_task.take() {
            self.timeline.cancel(task);
        }
        if let Some(task) = self.reminder_task.take() {
            self.timeline.cancel(task);
        }
        let ready_every = self.settings.ready_status_interval();
        if !ready_every.is_zero() {
            self.ready_status_task = Some(self.schedule_repeating(
                ready_every,
                TaskScope::Map,
                ScheduledAction::ReadyStatus,
            ));
        }
        let remind_every = self.settings.command_reminder_interval();
        if !remind_every.is_zero() && !self.settings.command_reminders.is_empty() {
            self.reminder_task = Some(self.schedule_repeating(
                remind_every,
                TaskScope::Session,
                ScheduledAction::CommandReminder,
            ));
        }
    }

    pub(super) fn announce_ready_status(&mut self) {
        if !ReadyRoster::accepts_changes(self.phase) {
            return;
        }
        let required = self.required_ready();
        self.broadcast(Notice::ReadyStatus {
            ready: self.ready.len(),
            required,
        });
        let names: Vec<String> = self
            .directory
            .connected_players()
            .into_iter()
            .filter(|p| !p.is_bot && !self.ready.contains(p.id))
            .map(|p| p.name)
            .collect();
        if !names.is_empty() {
            self.broadcast(Notice::NotReadyPlayers { names });
        }
    }

    pub(super) fn announce_command_reminder(&mut self) {
        let reminders = &self.settings.command_reminders;
        if reminders.is_empty() {
            return;
        }
        let command = reminders[self.reminder_cursor % reminders.len()].clone();
        self.reminder_cursor = self.reminder_cursor.wrapping_add(1);
        self.broadcast(Notice::CommandReminder { command });
    }

    /// Fill empty captain slots once the chosen map is up
    pub(super) fn select_captains(&mut self) {
        if self.phase != MatchPhase::MapChosen {
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
                warn!("Captain selection deferred - team: {}, reason: {}", team, err);
            }
        }
        let delay = self.settings.captains_announcement_delay();
        self.schedule(delay, TaskScope::Phase, ScheduledAction::AnnounceCaptains);
    }

    pub(super) fn announce_captains(&mut self) {
        if self.phase != MatchPhase::MapChosen {
            return;
        }
        self.broadcast(Notice::CaptainsAnnounced {
            ct: self.draft.captain(Team::CT).map(|c| c.name.clone()),
            t: self.draft.captain(Team::T).map(|c| c.name.clone()),
        });
    }

    /// Ask the notifier to advertise the server. Returns the number of
    /// missing players the invite was sent for.
    pub fn request_invite(&mut self, player: PlayerId) -> MatchResult<usize> {
        let now = self.timeline.now();
        if let Some(last) = self.last_invite_at {
            let available_at = last + self.invite_delay;
            if now < available_at {
                return Err(MatchError::InviteCooldown {
                    remaining: format_cooldown(available_at - now),
                });
            }
        }

        let missing = self
            .settings
            .minimum_ready_players
            .saturating_sub(self.directory.connected_count());
        if missing < 1 {
            self.tell(player, Notice::InviteNotNeeded);
            return Ok(0);
        }

        self.last_invite_at = Some(now);
        let by = self.player_name(player);
        info!("Invite sent by {} - missing players: {}", by, missing);
        self.broadcast(Notice::InviteSent { by });
        self.emit(Effect::SendInvite {
            missing_players: missing,
        });
        Ok(missing)
    }
}
