//! Deferred work the orchestrator schedules on its timeline

use crate::config::MapEntry;
use crate::types::{PlayerId, PlayerRef, SideChoice, Team};
use std::time::Duration;

/// A continuation registered on the orchestrator's timeline.
///
/// Every action is stamped with a scope when scheduled and is dropped
/// unexecuted if that scope ended in the meantime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduledAction {
    CloseMapVote,
    /// Issue the level change for a selected map
    ChangeLevel { map: MapEntry },
    /// Repeat the loading notice while the change is in flight
    MapLoadingReminder { map: MapEntry },
    /// Warmup config plus ready announcements after a map load
    LoadWarmupConfig,
    ExecConfig { name: String },
    SelectCaptains,
    AnnounceCaptains,
    ReadyStatus,
    CommandReminder,
    AutoAssignTeam { player: PlayerId },
    /// A bot captain's pick, applied one tick after its turn began
    BotDraftPick { captain: PlayerId, player: PlayerId },
    ApplySideChoice { captain: PlayerRef, choice: SideChoice },
    ExpireTimeoutVote { vote_id: u64 },
    TimeoutTimeLeft { team: Team, ends_at: Duration },
    EndTimeout { team: Team },
    HalftimeSwap,
    ClearMoveFlag,
    ResetMatch,
    /// Second half of a reset, run on the tick after it was requested
    FullReset,
    ApplyLeavePunishment { player: PlayerRef },
}

impl ScheduledAction {
    pub fn name(&self) -> &'static str {
        match self {
            ScheduledAction::CloseMapVote => "close_map_vote",
            ScheduledAction::ChangeLevel { .. } => "change_level",
            ScheduledAction::MapLoadingReminder { .. } => "map_loading_reminder",
            ScheduledAction::LoadWarmupConfig => "load_warmup_config",
            ScheduledAction::ExecConfig { .. } => "exec_config",
            ScheduledAction::SelectCaptains => "select_captains",
            ScheduledAction::AnnounceCaptains => "announce_captains",
            ScheduledAction::ReadyStatus => "ready_status",
            ScheduledAction::CommandReminder => "command_reminder",
            ScheduledAction::AutoAssignTeam { .. } => "auto_assign_team",
            ScheduledAction::BotDraftPick { .. } => "bot_draft_pick",
            ScheduledAction::ApplySideChoice { .. } => "apply_side_choice",
            ScheduledAction::ExpireTimeoutVote { .. } => "expire_timeout_vote",
            ScheduledAction::TimeoutTimeLeft { .. } => "timeout_time_left",
            ScheduledAction::EndTimeout { .. } => "end_timeout",
            ScheduledAction::HalftimeSwap => "halftime_swap",
            ScheduledAction::ClearMoveFlag => "clear_move_flag",
            ScheduledAction::ResetMatch => "reset_match",
            ScheduledAction::FullReset => "full_reset",
            ScheduledAction::ApplyLeavePunishment { .. } => "apply_leave_punishment",
        }
    }
}
