//! The match orchestrator aggregate
//!
//! All per-match state lives in one [`MatchOrchestrator`] and only changes
//! inside [`MatchOrchestrator::handle`] and [`MatchOrchestrator::advance`].
//! Neither performs I/O: both return the [`Effect`]s produced, in order.
//!
//! The implementation is split by lifecycle stage:
//! - `lobby`: readiness, map voting and map loading
//! - `picking`: captains, the draft, the knife round and the side pick
//! - `live`: the running match, halftime and timeouts
//! - `presence`: connects, disconnects and team change review

mod live;
mod lobby;
mod picking;
mod presence;

use crate::config::{AppConfig, MapCatalog, MapEntry, MixSettings, PunishmentSettings};
use crate::error::{MatchError, MatchResult};
use crate::match_flow::actions::ScheduledAction;
use crate::match_flow::commands::{Command, CommandRegistry};
use crate::match_flow::effects::{Effect, EngineCommand, MapOption, Menu, Notice};
use crate::match_flow::events::{MatchEvent, MenuSelection};
use crate::match_flow::phase::MatchPhase;
use crate::match_flow::timings::MAP_CHANGE_DELAY;
use crate::players::PlayerDirectory;
use crate::roster::{DraftState, ReadyRoster, RosterStage};
use crate::scheduler::{Epochs, TaskScope, TaskToken, Timeline};
use crate::timeout::TimeoutCoordinator;
use crate::types::{Issuer, PlayerId, PlayerRef, SideChoice, Team};
use crate::voting::{MapVoteTally, PlayedMapHistory};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub use presence::TeamChangeVerdict;

/// Counters about orchestrator activity
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrchestratorStats {
    /// Phase changes, including re-entry of the same phase
    pub phase_transitions: u64,
    pub commands_accepted: u64,
    pub commands_rejected: u64,
    pub map_votes: u64,
    pub matches_started: u64,
    pub timeouts_started: u64,
    /// Disconnects that required more than a readiness check
    pub disconnect_repairs: u64,
    pub resets: u64,
    /// Scheduled tasks dropped because their scope had ended
    pub stale_tasks_skipped: u64,
}

/// Point-in-time view of the match, served on the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct MatchStatus {
    pub phase: MatchPhase,
    pub map: Option<String>,
    pub connected: usize,
    pub ready: usize,
    pub required: usize,
    pub captain_ct: Option<String>,
    pub captain_t: Option<String>,
    pub roster_ct: Vec<String>,
    pub roster_t: Vec<String>,
    pub timeouts_ct: u32,
    pub timeouts_t: u32,
    pub scheduled_tasks: usize,
}

/// Single owner of the match lifecycle
pub struct MatchOrchestrator {
    settings: MixSettings,
    punishment: PunishmentSettings,
    invite_delay: Duration,
    catalog: MapCatalog,
    registry: CommandRegistry,
    directory: Arc<dyn PlayerDirectory>,
    rng: StdRng,

    phase: MatchPhase,
    ready: ReadyRoster,
    votes: MapVoteTally,
    vote_options: Vec<MapEntry>,
    history: PlayedMapHistory,
    draft: DraftState,
    knife_winner: Option<Team>,
    side_decider: Option<PlayerRef>,
    side_decided: bool,
    timeouts: TimeoutCoordinator,
    freeze_time: bool,
    moving_players: bool,
    halftime_pending: bool,
    current_map: Option<String>,
    loading_map: Option<MapEntry>,
    last_invite_at: Option<Duration>,
    reminder_cursor: usize,
    ready_status_task: Option<TaskToken>,
    reminder_task: Option<TaskToken>,
    punishments: HashMap<PlayerId, TaskToken>,

    timeline: Timeline<ScheduledAction>,
    epochs: Epochs,
    outbox: Vec<Effect>,
    stats: OrchestratorStats,
}

impl MatchOrchestrator {
    /// Create an orchestrator in Warmup. The RNG is seeded from
    /// `service.rng_seed` when set, from entropy otherwise.
    pub fn new(config: &AppConfig, directory: Arc<dyn PlayerDirectory>) -> Self {
        let rng = match config.service.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, directory, rng)
    }

    /// Create an orchestrator with a fixed seed, for replays and tests
    pub fn with_seed(config: &AppConfig, directory: Arc<dyn PlayerDirectory>, seed: u64) -> Self {
        Self::with_rng(config, directory, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &AppConfig, directory: Arc<dyn PlayerDirectory>, rng: StdRng) -> Self {
        info!(
            "Creating match orchestrator - maps: {}, minimum ready: {}, timeouts per team: {}",
            config.maps.len(),
            config.mix.minimum_ready_players,
            config.mix.timeouts_per_team
        );
        Self {
            settings: config.mix.clone(),
            punishment: config.punishment.clone(),
            invite_delay: config.invite.invite_delay(),
            catalog: MapCatalog::new(config.maps.clone()),
            registry: CommandRegistry::new(&config.commands, config.mix.allow_volunteer_captains),
            directory,
            rng,
            phase: MatchPhase::Warmup,
            ready: ReadyRoster::new(),
            votes: MapVoteTally::new(),
            vote_options: Vec::new(),
            history: PlayedMapHistory::new(config.mix.map_cooldown_window),
            draft: DraftState::new(),
            knife_winner: None,
            side_decider: None,
            side_decided: false,
            timeouts: TimeoutCoordinator::new(config.mix.timeouts_per_team),
            freeze_time: false,
            moving_players: false,
            halftime_pending: false,
            current_map: None,
            loading_map: None,
            last_invite_at: None,
            reminder_cursor: 0,
            ready_status_task: None,
            reminder_task: None,
            punishments: HashMap::new(),
            timeline: Timeline::new(),
            epochs: Epochs::default(),
            outbox: Vec::new(),
            stats: OrchestratorStats::default(),
        }
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn ready(&self) -> &ReadyRoster {
        &self.ready
    }

    pub fn draft(&self) -> &DraftState {
        &self.draft
    }

    pub fn votes(&self) -> &MapVoteTally {
        &self.votes
    }

    /// Maps on the ballot of the current or last vote
    pub fn vote_options(&self) -> &[MapEntry] {
        &self.vote_options
    }

    pub fn history(&self) -> &PlayedMapHistory {
        &self.history
    }

    pub fn timeouts(&self) -> &TimeoutCoordinator {
        &self.timeouts
    }

    pub fn current_map(&self) -> Option<&str> {
        self.current_map.as_deref()
    }

    /// Captain whose stay/switch decision is outstanding
    pub fn side_decider(&self) -> Option<&PlayerRef> {
        self.side_decider.as_ref().filter(|_| !self.side_decided)
    }

    pub fn is_moving_players(&self) -> bool {
        self.moving_players
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.timeline.now()
    }

    pub fn pending_tasks(&self) -> usize {
        self.timeline.len()
    }

    pub fn stats(&self) -> &OrchestratorStats {
        &self.stats
    }

    pub fn status(&self) -> MatchStatus {
        let connected = self.directory.connected_count();
        let names = |team: Team| -> Vec<String> {
            self.draft
                .playing(team)
                .iter()
                .map(|p| p.name.clone())
                .collect()
        };
        MatchStatus {
            phase: self.phase,
            map: self.current_map.clone(),
            connected,
            ready: self.ready.len(),
            required: ReadyRoster::required(self.settings.minimum_ready_players, connected),
            captain_ct: self.draft.captain(Team::CT).map(|c| c.name.clone()),
            captain_t: self.draft.captain(Team::T).map(|c| c.name.clone()),
            roster_ct: names(Team::CT),
            roster_t: names(Team::T),
            timeouts_ct: self.timeouts.remaining(Team::CT),
            timeouts_t: self.timeouts.remaining(Team::T),
            scheduled_tasks: self.timeline.len(),
        }
    }

    /// Process one external event and return the effects it produced
    pub fn handle(&mut self, event: MatchEvent) -> Vec<Effect> {
        debug!("Handling event '{}' during {}", event.name(), self.phase);
        match event {
            MatchEvent::Command { issuer, line } => self.handle_command_line(&issuer, &line),
            MatchEvent::MenuSelection { player, selection } => {
                self.handle_menu_selection(player, selection)
            }
            MatchEvent::PlayerConnected { player } => self.on_player_connected(player),
            MatchEvent::PlayerDisconnected { player, name } => {
                self.on_player_disconnected(PlayerRef::new(player, name))
            }
            MatchEvent::TeamChangeRequested { player, team } => {
                self.review_team_change(player, team);
            }
            MatchEvent::MapStarted { map } => self.on_map_started(&map),
            MatchEvent::RoundPrestart => self.on_round_prestart(),
            MatchEvent::RoundStart => self.on_round_start(),
            MatchEvent::FreezeTimeEnded => self.freeze_time = false,
            MatchEvent::RoundEnded { winner } => self.on_round_ended(winner),
            MatchEvent::Halftime => self.on_halftime(),
            MatchEvent::MatchEnded => self.on_match_ended(),
        }
        self.take_effects()
    }

    /// Move virtual time forward by `elapsed`, running every task that falls
    /// due on the way in fire-time order
    pub fn advance(&mut self, elapsed: Duration) -> Vec<Effect> {
        let until = self.timeline.now() + elapsed;
        while let Some(task) = self.timeline.pop_due(until) {
            if !self.epochs.is_current(&task.stamp) {
                debug!(
                    "Skipping stale task '{}' ({:?} scope)",
                    task.action.name(),
                    task.stamp.scope
                );
                // repeating tasks were re-queued by pop_due
                self.timeline.cancel(task.token);
                self.stats.stale_tasks_skipped += 1;
                continue;
            }
            self.run_action(task.action);
        }
        self.timeline.settle(until);
        self.take_effects()
    }

    /// Drain effects produced by the typed operations
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.outbox)
    }

    /// Run a parsed command on behalf of `issuer`
    pub fn execute(&mut self, issuer: &Issuer, command: Command) -> MatchResult<()> {
        let by = self.issuer_name(issuer);
        info!("Executing command '{}' for {}", command.name(), by);
        match command {
            Command::Reset => {
                self.reset_match(&by);
                Ok(())
            }
            Command::ForceStart => self.force_start(&by),
            Command::ForceReady => self.force_ready(&by),
            Command::Captain { team, player } => {
                self.captain_command(issuer, team, player.as_deref())
            }
            Command::ChangeMap { map } => self.change_map(&by, &map),
            Command::ListMaps => {
                self.list_maps(issuer, false);
                Ok(())
            }
            Command::ListAllMaps => {
                self.list_maps(issuer, true);
                Ok(())
            }
            Command::Ready => self.mark_ready(require_player(issuer)?).map(|_| ()),
            Command::Unready => self.mark_unready(require_player(issuer)?).map(|_| ()),
            Command::Revote => self.revote(require_player(issuer)?),
            Command::Timeout => self.request_timeout(require_player(issuer)?).map(|_| ()),
            Command::Invite => self.request_invite(require_player(issuer)?).map(|_| ()),
            Command::Stay => self.choose_side(require_player(issuer)?, SideChoice::Stay),
            Command::Switch => self.choose_side(require_player(issuer)?, SideChoice::Switch),
            Command::VolunteerCaptain { team } => {
                self.volunteer_captain(require_player(issuer)?, team).map(|_| ())
            }
        }
    }

    /// Admin reset: announce and return to Warmup on the next tick
    pub fn reset_match(&mut self, by: &str) {
        self.broadcast(Notice::MixReset { by: by.to_string() });
        self.request_reset();
    }

    fn handle_command_line(&mut self, issuer: &Issuer, line: &str) {
        // plain chat from players is not ours to answer
        if issuer.player_id().is_some() && !self.registry.is_command(line) {
            return;
        }
        let result = self
            .registry
            .parse(issuer, line)
            .and_then(|command| self.execute(issuer, command));
        match result {
            Ok(()) => self.stats.commands_accepted += 1,
            Err(err) => {
                self.stats.commands_rejected += 1;
                warn!(
                    "Command rejected - line: '{}', issuer: {}, reason: {}",
                    line.trim(),
                    self.issuer_name(issuer),
                    err
                );
                self.reply(
                    issuer,
                    Notice::Rejected {
                        reason: err.to_string(),
                    },
                );
            }
        }
    }

    fn handle_menu_selection(&mut self, player: PlayerId, selection: MenuSelection) {
        let result = match selection {
            MenuSelection::MapVote { map } => self.register_map_vote(player, &map).map(|_| ()),
            MenuSelection::DraftPick { player: pick } => {
                match self.select_draft_pick(player, pick) {
                    // already answered with an invalid-pick notice and a new prompt
                    Err(MatchError::InvalidArgument { .. }) => Ok(()),
                    other => other,
                }
            }
            MenuSelection::CaptainPick { team, player: pick } => {
                self.close_menu(player);
                self.assign_captain(team, pick).map(|_| ())
            }
            MenuSelection::Side { choice } => self.choose_side(player, choice),
            MenuSelection::TimeoutBallot { ballot } => self.cast_timeout_ballot(player, ballot),
        };
        if let Err(err) = result {
            warn!("Menu selection rejected - player: {}, reason: {}", player, err);
            self.tell(
                player,
                Notice::Rejected {
                    reason: err.to_string(),
                },
            );
        }
    }

    fn run_action(&mut self, action: ScheduledAction) {
        debug!("Running task '{}' during {}", action.name(), self.phase);
        match action {
            ScheduledAction::CloseMapVote => self.close_map_vote(),
            ScheduledAction::ChangeLevel { map } => self.change_level(&map),
            ScheduledAction::MapLoadingReminder { map } => self.remind_map_loading(map),
            ScheduledAction::LoadWarmupConfig => {
                if ReadyRoster::accepts_changes(self.phase) {
                    self.load_warmup_config();
                }
            }
            ScheduledAction::ExecConfig { name } => self.exec_config(&name),
            ScheduledAction::SelectCaptains => self.select_captains(),
            ScheduledAction::AnnounceCaptains => self.announce_captains(),
            ScheduledAction::ReadyStatus => self.announce_ready_status(),
            ScheduledAction::CommandReminder => self.announce_command_reminder(),
            ScheduledAction::AutoAssignTeam { player } => self.auto_assign_team(player),
            ScheduledAction::BotDraftPick { captain, player } => {
                if let Err(err) = self.select_draft_pick(captain, player) {
                    debug!("Bot pick discarded - captain: {}, reason: {}", captain, err);
                }
            }
            ScheduledAction::ApplySideChoice { captain, choice } => {
                self.apply_side_choice(&captain, choice)
            }
            ScheduledAction::ExpireTimeoutVote { vote_id } => {
                if let Some(outcome) = self.timeouts.expire_vote(vote_id) {
                    self.on_timeout_vote_closed(outcome);
                }
            }
            ScheduledAction::TimeoutTimeLeft { team, ends_at } => {
                self.announce_timeout_left(team, ends_at)
            }
            ScheduledAction::EndTimeout { team } => self.end_timeout(team),
            ScheduledAction::HalftimeSwap => self.swap_at_halftime(),
            ScheduledAction::ClearMoveFlag => self.moving_players = false,
            ScheduledAction::ResetMatch => self.request_reset(),
            ScheduledAction::FullReset => self.perform_full_reset(),
            ScheduledAction::ApplyLeavePunishment { player } => {
                self.apply_leave_punishment(player)
            }
        }
    }

    /// Change phase. Re-entering the current phase still ends its scope.
    fn set_phase(&mut self, next: MatchPhase) {
        let previous = self.phase;
        self.phase = next;
        self.epochs.bump_phase();
        self.stats.phase_transitions += 1;
        info!("Phase transition - {} -> {}", previous, next);
    }

    /// First half of a reset: end every scope now, finish on the next tick
    fn request_reset(&mut self) {
        info!("Reset requested during {}", self.phase);
        self.set_phase(MatchPhase::Reset);
        self.epochs.bump_session();
        let purged = self.timeline.purge_stale(&self.epochs);
        debug!("Purged {} scheduled tasks", purged);
        self.ready_status_task = None;
        self.reminder_task = None;
        self.stats.resets += 1;
        self.schedule(Duration::ZERO, TaskScope::Session, ScheduledAction::FullReset);
    }

    fn perform_full_reset(&mut self) {
        for player in self.humans() {
            self.close_menu(player);
        }
        self.ready.clear();
        self.votes.clear();
        self.vote_options.clear();
        self.draft.reset();
        self.knife_winner = None;
        self.side_decider = None;
        self.side_decided = false;
        self.timeouts.reset();
        self.freeze_time = false;
        self.moving_players = false;
        self.halftime_pending = false;
        self.loading_map = None;
        self.reminder_cursor = 0;

        self.announce_team_names();
        self.engine(EngineCommand::UnpauseMatch);
        self.set_phase(MatchPhase::Warmup);

        match self.catalog.first().cloned() {
            Some(map) => {
                info!("Reset complete, returning to '{}'", map.name);
                self.engine(EngineCommand::StopRecording);
                self.schedule(
                    MAP_CHANGE_DELAY,
                    TaskScope::Session,
                    ScheduledAction::ChangeLevel { map },
                );
            }
            None => warn!("Reset complete but the map catalog is empty"),
        }
    }

    fn schedule(&mut self, delay: Duration, scope: TaskScope, action: ScheduledAction) -> TaskToken {
        debug!(
            "Scheduling '{}' in {:?} ({:?} scope)",
            action.name(),
            delay,
            scope
        );
        let stamp = self.epochs.stamp(scope);
        self.timeline.schedule(delay, stamp, action)
    }

    fn schedule_repeating(
        &mut self,
        period: Duration,
        scope: TaskScope,
        action: ScheduledAction,
    ) -> TaskToken {
        let stamp = self.epochs.stamp(scope);
        self.timeline.schedule_repeating(period, stamp, action)
    }

    fn emit(&mut self, effect: Effect) {
        self.outbox.push(effect);
    }

    fn broadcast(&mut self, notice: Notice) {
        self.emit(Effect::Broadcast { notice });
    }

    fn tell(&mut self, player: PlayerId, notice: Notice) {
        self.emit(Effect::Tell { player, notice });
    }

    fn tell_team(&mut self, team: Team, notice: Notice) {
        self.emit(Effect::TellTeam { team, notice });
    }

    fn reply(&mut self, issuer: &Issuer, notice: Notice) {
        match issuer.player_id() {
            Some(player) => self.tell(player, notice),
            None => self.emit(Effect::ConsoleReply { notice }),
        }
    }

    fn engine(&mut self, command: EngineCommand) {
        self.emit(Effect::Engine { command });
    }

    fn exec_config(&mut self, name: &str) {
        self.engine(EngineCommand::exec(name));
    }

    fn move_player(&mut self, player: PlayerId, team: Team) {
        self.emit(Effect::MovePlayer { player, team });
    }

    fn open_menu(&mut self, player: PlayerId, menu: Menu) {
        self.emit(Effect::OpenMenu { player, menu });
    }

    fn close_menu(&mut self, player: PlayerId) {
        self.emit(Effect::CloseMenu { player });
    }

    /// Connected human players, the only ones who see menus
    fn humans(&self) -> Vec<PlayerId> {
        self.directory
            .connected_players()
            .into_iter()
            .filter(|p| !p.is_bot)
            .map(|p| p.id)
            .collect()
    }

    fn issuer_name(&self, issuer: &Issuer) -> String {
        match issuer.player_id() {
            Some(id) => self
                .directory
                .player(id)
                .map(|p| p.name)
                .unwrap_or_else(|| format!("#{}", id)),
            None => "Console".to_string(),
        }
    }

    fn player_name(&self, id: PlayerId) -> String {
        self.issuer_name(&Issuer::player(id))
    }

    /// Push `team_<captain>` names to the engine, or the defaults
    fn announce_team_names(&mut self) {
        for team in Team::PLAYING {
            let name = match self.draft.captain(team) {
                Some(captain) => format!("team_{}", captain.name),
                None => team.default_name().to_string(),
            };
            self.engine(EngineCommand::TeamName { team, name });
        }
    }

    /// Put every connected player on their match roster side; players outside
    /// the rosters go to spectator when overflow moving is enabled
    fn move_to_rosters(&mut self) {
        for player in self.directory.connected_players() {
            let target = match self.draft.team_of(RosterStage::Playing, player.id) {
                Some(team) => team,
                None if self.settings.move_overflow_players_to_spec => Team::Spectator,
                None => continue,
            };
            if player.team != target {
                self.move_player(player.id, target);
            }
        }
    }
}

fn require_player(issuer: &Issuer) -> MatchResult<PlayerId> {
    issuer
        .player_id()
        .ok_or_else(|| MatchError::invalid_argument("this command can only be used by a player"))
}

fn map_options(maps: &[MapEntry]) -> Vec<MapOption> {
    maps.iter()
        .map(|m| MapOption {
            name: m.name.clone(),
            display_name: m.display_name.clone(),
        })
        .collect()
}
