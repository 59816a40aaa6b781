//! The running match: start, halftime, end and team timeouts

use super::MatchOrchestrator;
use crate::error::{MatchError, MatchResult};
use crate::match_flow::actions::ScheduledAction;
use crate::match_flow::decider::{decider_for, Decision};
use crate::match_flow::effects::{EngineCommand, Menu, Notice};
use crate::match_flow::phase::MatchPhase;
use crate::match_flow::timings::{
    HALFTIME_SWAP_DELAY, MATCH_END_RESET_DELAY, TIMEOUT_ANNOUNCE_PERIOD,
};
use crate::roster::RosterStage;
use crate::scheduler::TaskScope;
use crate::timeout::{TimeoutRequest, TimeoutStart, VoteOutcome};
use crate::types::{Ballot, PlayerId, Team};
use std::time::Duration;
use tracing::{debug, info, warn};

impl MatchOrchestrator {
    pub(super) fn start_match(&mut self) {
        self.set_phase(MatchPhase::Match);
        self.knife_winner = None;
        self.side_decider = None;
        self.side_decided = false;
        self.timeouts.reset();
        self.freeze_time = false;

        self.move_to_rosters();
        self.announce_team_names();
        self.engine(EngineCommand::UnpauseMatch);
        self.exec_config("match_start.cfg");

        let map = self
            .current_map
            .as_deref()
            .map(|name| self.catalog.find(name).cloned());
        let shown = match map {
            Some(Some(entry)) => {
                self.history.record(&entry.name);
                Some(entry.display_name)
            }
            Some(None) => {
                let raw = self.current_map.clone().unwrap_or_default();
                self.history.record(&raw);
                Some(raw)
            }
            None => None,
        };
        self.stats.matches_started += 1;
        info!(
            "Match started - map: {:?}, ct: {}, t: {}",
            shown,
            self.draft.playing(Team::CT).len(),
            self.draft.playing(Team::T).len()
        );
        self.broadcast(Notice::MatchStarted { map: shown });
    }

    pub(super) fn on_round_prestart(&mut self) {
        self.freeze_time = true;
        if matches!(self.phase, MatchPhase::Match | MatchPhase::Timeout) {
            self.start_pending_timeout();
        }
    }

    pub(super) fn on_round_start(&mut self) {
        if self.halftime_pending {
            self.halftime_pending = false;
            self.schedule(
                HALFTIME_SWAP_DELAY,
                TaskScope::Session,
                ScheduledAction::HalftimeSwap,
            );
        }
    }

    /// Engine signalled halftime; rosters swap after the next round starts
    pub(super) fn on_halftime(&mut self) {
        if !matches!(self.phase, MatchPhase::Match | MatchPhase::Timeout) {
            debug!("Ignoring halftime during {}", self.phase);
            return;
        }
        info!("Halftime reached");
        self.moving_players = true;
        self.halftime_pending = true;
    }

    pub(super) fn swap_at_halftime(&mut self) {
        self.draft.swap_sides();
        self.broadcast(Notice::HalftimeSwap);
        info!(
            "Rosters swapped for the second half - ct captain: {:?}, t captain: {:?}",
            self.draft.captain(Team::CT).map(|c| c.name.as_str()),
            self.draft.captain(Team::T).map(|c| c.name.as_str())
        );
        self.schedule(
            HALFTIME_SWAP_DELAY,
            TaskScope::Session,
            ScheduledAction::ClearMoveFlag,
        );
    }

    pub(super) fn on_match_ended(&mut self) {
        if !matches!(self.phase, MatchPhase::Match | MatchPhase::Timeout) {
            debug!("Ignoring match end during {}", self.phase);
            return;
        }
        self.set_phase(MatchPhase::Ended);
        self.broadcast(Notice::MatchEnded);
        self.schedule(
            MATCH_END_RESET_DELAY,
            TaskScope::Phase,
            ScheduledAction::ResetMatch,
        );
    }

    /// Team the caller plays for: their match roster, else their live slot
    fn timeout_team(&self, caller: PlayerId) -> Option<Team> {
        self.draft
            .team_of(RosterStage::Playing, caller)
            .or_else(|| {
                self.directory
                    .player(caller)
                    .map(|p| p.team)
                    .filter(|team| team.is_playing())
            })
    }

    /// Connected players voting for `team`, caller included
    fn timeout_voters(&self, team: Team, caller: PlayerId) -> Vec<PlayerId> {
        let roster = self.draft.playing(team);
        let mut voters: Vec<PlayerId> = if roster.is_empty() {
            self.directory.players_on(team).iter().map(|p| p.id).collect()
        } else {
            roster
                .iter()
                .filter(|p| self.directory.is_connected(p.id))
                .map(|p| p.id)
                .collect()
        };
        if !voters.contains(&caller) {
            voters.push(caller);
        }
        voters
    }

    pub fn request_timeout(&mut self, caller: PlayerId) -> MatchResult<TimeoutRequest> {
        if !matches!(self.phase, MatchPhase::Match | MatchPhase::Timeout) {
            return Err(MatchError::invalid_state("timeout", self.phase));
        }
        let info = self
            .directory
            .player(caller)
            .ok_or(MatchError::PlayerNotFound { player_id: caller })?;
        let team = self.timeout_team(caller).ok_or_else(|| {
            MatchError::invalid_argument("only players on a team can call a timeout")
        })?;
        let voters = self.timeout_voters(team, caller);
        let request = self.timeouts.request(team, info.to_ref(), voters.clone())?;

        match request {
            TimeoutRequest::VoteStarted { vote_id } => {
                self.tell_team(
                    team,
                    Notice::TimeoutVoteStarted {
                        team,
                        caller: info.name.clone(),
                    },
                );
                let window = self.settings.timeout_vote_window();
                self.schedule(
                    window,
                    TaskScope::Session,
                    ScheduledAction::ExpireTimeoutVote { vote_id },
                );
                for voter in voters.into_iter().filter(|id| *id != caller) {
                    if self.timeouts.vote().is_none() {
                        break;
                    }
                    let Some(player) = self.directory.player(voter) else {
                        continue;
                    };
                    match decider_for(player.is_bot).timeout_ballot() {
                        Decision::Now(ballot) => match self.timeouts.cast(voter, ballot) {
                            Ok(Some(outcome)) => self.on_timeout_vote_closed(outcome),
                            Ok(None) => {}
                            Err(err) => debug!("Bot ballot ignored - {}", err),
                        },
                        Decision::Prompt => self.open_menu(
                            voter,
                            Menu::TimeoutVote {
                                team,
                                caller: info.name.clone(),
                            },
                        ),
                    }
                }
                if let Some(outcome) = self.timeouts.conclude_if_complete() {
                    self.on_timeout_vote_closed(outcome);
                }
            }
            TimeoutRequest::Queued { position } => {
                debug!("Timeout for {} queued at position {}", team, position);
                self.tell_team(team, Notice::TimeoutQueued { team });
            }
            TimeoutRequest::AlreadyQueued => self.tell(caller, Notice::TimeoutPending { team }),
        }
        Ok(request)
    }

    pub fn cast_timeout_ballot(&mut self, voter: PlayerId, ballot: Ballot) -> MatchResult<()> {
        if !matches!(self.phase, MatchPhase::Match | MatchPhase::Timeout) {
            return Err(MatchError::invalid_state("timeout vote", self.phase));
        }
        let outcome = self.timeouts.cast(voter, ballot)?;
        self.close_menu(voter);
        if let Some(outcome) = outcome {
            self.on_timeout_vote_closed(outcome);
        }
        Ok(())
    }

    pub(super) fn on_timeout_vote_closed(&mut self, outcome: VoteOutcome) {
        let team = match outcome {
            VoteOutcome::Passed { team } | VoteOutcome::Failed { team } => team,
        };
        for player in self.directory.players_on(team) {
            if !player.is_bot {
                self.close_menu(player.id);
            }
        }
        match outcome {
            VoteOutcome::Passed { team } => {
                self.broadcast(Notice::TimeoutVotePassed { team });
                if self.freeze_time {
                    self.start_pending_timeout();
                } else {
                    self.broadcast(Notice::TimeoutPending { team });
                }
            }
            VoteOutcome::Failed { team } => self.broadcast(Notice::TimeoutVoteFailed { team }),
        }
    }

    fn start_pending_timeout(&mut self) {
        match self.timeouts.start_pending() {
            Some(TimeoutStart::Started { team, remaining }) => self.run_timeout(team, remaining),
            Some(TimeoutStart::Queued { team }) => {
                self.broadcast(Notice::TimeoutQueued { team })
            }
            Some(TimeoutStart::Exhausted { team }) => {
                warn!("Pending timeout for {} has no budget left", team);
                self.broadcast(Notice::TimeoutSkipped { team });
            }
            None => {}
        }
    }

    fn run_timeout(&mut self, team: Team, remaining: u32) {
        let duration = self.settings.timeout_duration();
        self.set_phase(MatchPhase::Timeout);
        self.stats.timeouts_started += 1;
        self.engine(EngineCommand::PauseMatch);
        self.broadcast(Notice::TimeoutStarted {
            team,
            seconds: duration.as_secs(),
        });
        self.broadcast(Notice::TimeoutsRemaining {
            team,
            remaining,
            max: self.timeouts.max_per_team(),
        });
        let ends_at = self.timeline.now() + duration;
        self.schedule_repeating(
            TIMEOUT_ANNOUNCE_PERIOD,
            TaskScope::Phase,
            ScheduledAction::TimeoutTimeLeft { team, ends_at },
        );
        self.schedule(duration, TaskScope::Phase, ScheduledAction::EndTimeout { team });
    }

    pub(super) fn announce_timeout_left(&mut self, team: Team, ends_at: Duration) {
        if self.timeouts.active() != Some(team) {
            return;
        }
        let left = ends_at.saturating_sub(self.timeline.now());
        if !left.is_zero() {
            self.broadcast(Notice::TimeoutTimeLeft {
                seconds: left.as_secs(),
            });
        }
    }

    /// End the running timeout, then run the next queued one or resume play
    pub(super) fn end_timeout(&mut self, team: Team) {
        if self.timeouts.active() != Some(team) {
            debug!("Ignoring end of inactive timeout for {}", team);
            return;
        }
        self.broadcast(Notice::TimeoutEnded { team });

        let mut next = self.timeouts.finish();
        while let Some(queued) = next {
            match self.timeouts.begin(queued) {
                TimeoutStart::Started { team, remaining } => {
                    self.run_timeout(team, remaining);
                    return;
                }
                TimeoutStart::Exhausted { team } => {
                    info!("Queued timeout for {} skipped, no budget left", team);
                    self.broadcast(Notice::TimeoutSkipped { team });
                    next = self.timeouts.finish();
                }
                TimeoutStart::Queued { .. } => return,
            }
        }

        self.set_phase(MatchPhase::Match);
        self.engine(EngineCommand::UnpauseMatch);
    }
}

#[cfg(test)]
mod tests {
    use crate::config::AppConfig;
    use crate::error::MatchError;
    use crate::match_flow::{Effect, MatchEvent, MatchOrchestrator, MatchPhase, Notice};
    use crate::players::InMemoryPlayerDirectory;
    use crate::timeout::TimeoutRequest;
    use crate::types::{Ballot, PlayerInfo, SideChoice, Team};
    use std::sync::Arc;
    use std::time::Duration;

    /// A running match with 1,3,5 on CT and 2,4,6 on T
    fn live_match(timeouts_per_team: u32) -> MatchOrchestrator {
        let mut config = AppConfig::with_defaults();
        config.mix.minimum_ready_players = 6;
        config.mix.timeouts_per_team = timeouts_per_team;
        config.mix.timeout_duration_seconds = 30;
        let directory = Arc::new(InMemoryPlayerDirectory::with_players((1..=6).map(|id| {
            let team = if id % 2 == 1 { Team::CT } else { Team::T };
            PlayerInfo::human(id, format!("p{}", id), team)
        })));
        let mut orchestrator = MatchOrchestrator::with_seed(&config, directory, 3);
        orchestrator.force_start("Console").unwrap();
        orchestrator.handle(MatchEvent::RoundEnded { winner: Team::CT });
        let captain = orchestrator.side_decider().unwrap().id;
        orchestrator
            .choose_side(captain, SideChoice::Stay)
            .unwrap();
        orchestrator.advance(Duration::from_secs(1));
        assert_eq!(orchestrator.phase(), MatchPhase::Match);
        orchestrator.take_effects();
        orchestrator
    }

    #[test]
    fn test_vote_passes_and_starts_in_freeze_time() {
        let mut orchestrator = live_match(2);
        let request = orchestrator.request_timeout(1).unwrap();
        assert!(matches!(request, TimeoutRequest::VoteStarted { .. }));
        orchestrator.cast_timeout_ballot(3, Ballot::Yes).unwrap();
        assert_eq!(orchestrator.timeouts().pending(), None);
        orchestrator.cast_timeout_ballot(5, Ballot::No).unwrap();
        assert_eq!(orchestrator.timeouts().pending(), Some(Team::CT));
        assert_eq!(orchestrator.phase(), MatchPhase::Match);

        orchestrator.handle(MatchEvent::RoundPrestart);
        assert_eq!(orchestrator.phase(), MatchPhase::Timeout);
        assert_eq!(orchestrator.timeouts().remaining(Team::CT), 1);

        let effects = orchestrator.advance(Duration::from_secs(15));
        assert!(effects.contains(&Effect::Broadcast {
            notice: Notice::TimeoutTimeLeft { seconds: 15 }
        }));
        orchestrator.advance(Duration::from_secs(15));
        assert_eq!(orchestrator.phase(), MatchPhase::Match);
    }

    #[test]
    fn test_requests_during_timeout_are_queued() {
        let mut orchestrator = live_match(1);
        orchestrator.request_timeout(2).unwrap();
        orchestrator.cast_timeout_ballot(4, Ballot::Yes).unwrap();
        orchestrator.cast_timeout_ballot(6, Ballot::Yes).unwrap();
        orchestrator.handle(MatchEvent::RoundPrestart);
        assert_eq!(orchestrator.timeouts().active(), Some(Team::T));

        assert_eq!(
            orchestrator.request_timeout(1).unwrap(),
            TimeoutRequest::Queued { position: 1 }
        );
        // T already spent its only timeout; the queued request is skipped later
        assert_eq!(
            orchestrator.request_timeout(4).unwrap(),
            TimeoutRequest::Queued { position: 2 }
        );

        orchestrator.advance(Duration::from_secs(30));
        assert_eq!(orchestrator.timeouts().active(), Some(Team::CT));
        assert_eq!(orchestrator.phase(), MatchPhase::Timeout);

        let effects_after = orchestrator.advance(Duration::from_secs(30));
        assert!(effects_after.contains(&Effect::Broadcast {
            notice: Notice::TimeoutSkipped { team: Team::T }
        }));
        assert_eq!(orchestrator.phase(), MatchPhase::Match);
    }

    #[test]
    fn test_failed_vote_and_exhausted_budget() {
        let mut orchestrator = live_match(1);
        orchestrator.request_timeout(1).unwrap();
        orchestrator.cast_timeout_ballot(3, Ballot::No).unwrap();
        orchestrator.cast_timeout_ballot(5, Ballot::No).unwrap();
        assert_eq!(orchestrator.timeouts().pending(), None);

        orchestrator.request_timeout(1).unwrap();
        orchestrator.advance(Duration::from_secs(15));
        // an expired vote counts missing ballots as absent: 1 yes of 3 fails
        assert_eq!(orchestrator.timeouts().pending(), None);
        assert!(orchestrator.timeouts().vote().is_none());

        assert!(matches!(
            orchestrator.request_timeout(99),
            Err(MatchError::PlayerNotFound { .. })
        ));
    }

    #[test]
    fn test_halftime_swaps_rosters_after_round_start() {
        let mut orchestrator = live_match(1);
        let ct_captain = orchestrator.draft().captain(Team::CT).unwrap().id;
        orchestrator.handle(MatchEvent::Halftime);
        assert!(orchestrator.is_moving_players());
        orchestrator.handle(MatchEvent::RoundStart);
        orchestrator.advance(Duration::from_secs(1));
        assert_eq!(orchestrator.draft().captain(Team::T).unwrap().id, ct_captain);
        assert!(orchestrator.is_moving_players());
        orchestrator.advance(Duration::from_secs(1));
        assert!(!orchestrator.is_moving_players());
    }

    #[test]
    fn test_match_end_resets_to_warmup() {
        let mut orchestrator = live_match(1);
        orchestrator.handle(MatchEvent::MatchEnded);
        assert_eq!(orchestrator.phase(), MatchPhase::Ended);
        orchestrator.advance(Duration::from_secs(9));
        assert_eq!(orchestrator.phase(), MatchPhase::Ended);
        orchestrator.advance(Duration::from_secs(1));
        assert_eq!(orchestrator.phase(), MatchPhase::Warmup);
        assert_eq!(orchestrator.stats().resets, 1);
        assert_eq!(orchestrator.draft().playing_total(), 0);
    }
}
