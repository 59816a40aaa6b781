//! Disconnect recovery planning
//!
//! [`DisconnectRecovery::plan`] is a pure function of the current state and
//! the departed player. It returns purged rosters plus the repairs the
//! orchestrator must carry out, so recovery never re-enters itself.

use crate::config::PunishmentSettings;
use crate::match_flow::MatchPhase;
use crate::roster::{DraftState, PurgeOutcome, ReadyRoster};
use crate::timeout::TimeoutCoordinator;
use crate::types::{PlayerId, PlayerRef, Team};
use std::time::Duration;

/// Repair step requested by a recovery plan, in execution order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairIntent {
    /// A drafting captain left; their slot is already cleared
    RestartDraft { team: Team },
    /// A seated captain left; promote a teammate
    PromoteCaptain { team: Team },
    /// The knife round winner left before choosing; apply "stay"
    DefaultSideChoice,
    /// Remove the player's ballot from the open timeout vote
    DropTimeoutBallot,
    /// Sanction the player later unless they reconnect
    SchedulePunishment { player: PlayerRef, delay: Duration },
    /// Check the start condition again
    ReevaluateReadiness,
}

/// Borrowed view of the state recovery depends on
#[derive(Debug, Clone, Copy)]
pub struct RecoveryInput<'a> {
    pub phase: MatchPhase,
    pub draft: &'a DraftState,
    pub ready: &'a ReadyRoster,
    pub timeouts: &'a TimeoutCoordinator,
    /// Captain whose side decision is outstanding
    pub side_decider: Option<PlayerId>,
    pub punishment: &'a PunishmentSettings,
}

/// New roster state plus the repairs still to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPlan {
    pub draft: DraftState,
    pub ready: ReadyRoster,
    pub purged: PurgeOutcome,
    pub ready_removed: bool,
    pub intents: Vec<RepairIntent>,
}

pub struct DisconnectRecovery;

impl DisconnectRecovery {
    pub fn plan(input: RecoveryInput<'_>, departed: &PlayerRef) -> RecoveryPlan {
        let mut draft = input.draft.clone();
        let mut ready = input.ready.clone();
        let purged = draft.purge(departed.id);
        let ready_removed = ready.purge(departed.id);
        let mut intents = Vec::new();

        if let Some(team) = purged.captain_of {
            match input.phase {
                MatchPhase::PickingTeam => {
                    draft.set_captain(team, None);
                    intents.push(RepairIntent::RestartDraft { team });
                }
                MatchPhase::KnifeRound
                | MatchPhase::MapChosen
                | MatchPhase::Timeout
                | MatchPhase::PickingStartingSide
                | MatchPhase::Match => {
                    draft.set_captain(team, None);
                    intents.push(RepairIntent::PromoteCaptain { team });
                }
                // seated again when team picking starts
                _ => draft.set_captain(team, None),
            }
        }

        if input.phase == MatchPhase::PickingStartingSide
            && input.side_decider == Some(departed.id)
        {
            intents.push(RepairIntent::DefaultSideChoice);
        }

        if input
            .timeouts
            .vote()
            .is_some_and(|vote| vote.is_eligible(departed.id))
        {
            intents.push(RepairIntent::DropTimeoutBallot);
        }

        let punishment = input.punishment;
        if punishment.enabled && input.phase.is_punishable(punishment.sensitivity) {
            intents.push(RepairIntent::SchedulePunishment {
                player: departed.clone(),
                delay: punishment.wait_before_punishment(),
            });
        }

        intents.push(RepairIntent::ReevaluateReadiness);

        RecoveryPlan {
            draft,
            ready,
            purged,
            ready_removed,
            intents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::RosterStage;

    fn player(id: PlayerId) -> PlayerRef {
        PlayerRef::new(id, format!("player{}", id))
    }

    fn plan_for(
        phase: MatchPhase,
        draft: &DraftState,
        side_decider: Option<PlayerId>,
        punishment: &PunishmentSettings,
        departed: PlayerId,
    ) -> RecoveryPlan {
        let ready = ReadyRoster::new();
        let timeouts = TimeoutCoordinator::new(3);
        DisconnectRecovery::plan(
            RecoveryInput {
                phase,
                draft,
                ready: &ready,
                timeouts: &timeouts,
                side_decider,
                punishment,
            },
            &player(departed),
        )
    }

    fn seated_draft() -> DraftState {
        let mut draft = DraftState::new();
        draft.seat_captain(Team::CT, player(1), RosterStage::Playing);
        draft.seat_captain(Team::T, player(2), RosterStage::Playing);
        draft.add(RosterStage::Playing, Team::CT, player(3));
        draft
    }

    #[test]
    fn test_knife_round_captain_is_promoted() {
        let plan = plan_for(
            MatchPhase::KnifeRound,
            &seated_draft(),
            None,
            &PunishmentSettings::default(),
            1,
        );
        assert_eq!(
            plan.intents,
            vec![
                RepairIntent::PromoteCaptain { team: Team::CT },
                RepairIntent::ReevaluateReadiness
            ]
        );
        assert!(plan.draft.captain(Team::CT).is_none());
        assert_eq!(plan.draft.playing(Team::CT), &[player(3)]);
    }

    #[test]
    fn test_drafting_captain_restarts_draft() {
        let mut draft = DraftState::new();
        draft.seat_captain(Team::T, player(2), RosterStage::Picked);
        let plan = plan_for(
            MatchPhase::PickingTeam,
            &draft,
            None,
            &PunishmentSettings::default(),
            2,
        );
        assert_eq!(plan.intents[0], RepairIntent::RestartDraft { team: Team::T });
    }

    #[test]
    fn test_side_decider_defaults_to_stay_and_is_punished() {
        let punishment = PunishmentSettings {
            enabled: true,
            sensitivity: 1,
            ..PunishmentSettings::default()
        };
        let plan = plan_for(
            MatchPhase::PickingStartingSide,
            &seated_draft(),
            Some(2),
            &punishment,
            2,
        );
        assert_eq!(plan.intents[0], RepairIntent::PromoteCaptain { team: Team::T });
        assert_eq!(plan.intents[1], RepairIntent::DefaultSideChoice);
        assert!(matches!(
            plan.intents[2],
            RepairIntent::SchedulePunishment { .. }
        ));
        assert!(plan.draft.captain(Team::T).is_none());
    }

    #[test]
    fn test_match_captain_slot_never_outlives_the_player() {
        let plan = plan_for(
            MatchPhase::Match,
            &seated_draft(),
            None,
            &PunishmentSettings::default(),
            1,
        );
        assert_eq!(plan.intents[0], RepairIntent::PromoteCaptain { team: Team::CT });
        assert!(plan.draft.captain(Team::CT).is_none());

        let plan = plan_for(
            MatchPhase::Warmup,
            &seated_draft(),
            None,
            &PunishmentSettings::default(),
            2,
        );
        assert_eq!(plan.intents, vec![RepairIntent::ReevaluateReadiness]);
        assert!(plan.draft.captain(Team::T).is_none());
        assert_eq!(plan.draft.captain(Team::CT), Some(&player(1)));
    }

    #[test]
    fn test_plain_player_only_reevaluates() {
        let plan = plan_for(
            MatchPhase::Warmup,
            &seated_draft(),
            None,
            &PunishmentSettings {
                enabled: true,
                ..PunishmentSettings::default()
            },
            3,
        );
        assert_eq!(plan.intents, vec![RepairIntent::ReevaluateReadiness]);
        assert_eq!(plan.purged.removed_from_playing, Some(Team::CT));
    }
}
