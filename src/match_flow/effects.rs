//! Side-effect intents emitted by the orchestrator
//!
//! Nothing here performs I/O. The runtime forwards each [`Effect`] to the
//! game server bridge, the chat and menu layer, or the invite notifier.

use crate::types::{PlayerId, PlayerRef, SideChoice, Team};
use serde::{Deserialize, Serialize};

/// Directory all match configs live in on the game server
pub const CONFIG_DIR: &str = "mixscrims";

/// Raw engine instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineCommand {
    StopRecording,
    ChangeLevel { map: String },
    WorkshopChangeLevel { map: String, workshop_id: String },
    PauseMatch,
    UnpauseMatch,
    ExecConfig { name: String },
    TeamName { team: Team, name: String },
    /// Arbitrary server command, e.g. a leave sanction
    Server { command: String },
}

impl EngineCommand {
    pub fn exec(config: &str) -> Self {
        EngineCommand::ExecConfig {
            name: config.to_string(),
        }
    }

    /// Console lines the bridge should run for this command
    pub fn console_lines(&self) -> Vec<String> {
        match self {
            EngineCommand::StopRecording => vec!["tv_stoprecord".to_string()],
            EngineCommand::ChangeLevel { map } => vec![format!("map {}", map)],
            EngineCommand::WorkshopChangeLevel { map, workshop_id } => vec![
                format!("ds_workshop_changelevel {}", map),
                format!("host_workshop_map {}", workshop_id),
            ],
            EngineCommand::PauseMatch => vec!["mp_pause_match".to_string()],
            EngineCommand::UnpauseMatch => vec!["mp_unpause_match".to_string()],
            EngineCommand::ExecConfig { name } => vec![format!("exec {}/{}", CONFIG_DIR, name)],
            EngineCommand::TeamName { team, name } => {
                let slot = if *team == Team::CT { 1 } else { 2 };
                vec![format!("mp_teamname_{} {}", slot, name)]
            }
            EngineCommand::Server { command } => vec![command.clone()],
        }
    }
}

/// Option in a map vote menu
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapOption {
    pub name: String,
    pub display_name: String,
}

/// Menus shown to a single player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Menu {
    MapVote { options: Vec<MapOption> },
    DraftPick { team: Team, pool: Vec<PlayerRef> },
    CaptainPick { team: Team, pool: Vec<PlayerRef> },
    SidePick,
    TimeoutVote { team: Team, caller: String },
}

/// Message keys for the localized text layer, with their arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "key", rename_all = "snake_case")]
pub enum Notice {
    PlayerReady { name: String, ready: usize, required: usize },
    PlayerUnready { name: String, ready: usize, required: usize },
    AlreadyReady,
    AlreadyUnready,
    ReadyStatus { ready: usize, required: usize },
    NotReadyPlayers { names: Vec<String> },
    MapVotingStarted { seconds: u64 },
    VoteRegistered { map: String, votes: usize },
    MapChosen { map: String, votes: usize },
    MapChosenRandom { map: String },
    NoMapsConfigured,
    ChangingMap { map: String },
    MapLoading { map: String },
    GoToMap { by: String, map: String },
    MapListing { maps: Vec<MapOption> },
    CaptainAssigned { team: Team, name: String },
    CaptainPromoted { team: Team, name: String },
    CaptainsAnnounced { ct: Option<String>, t: Option<String> },
    CaptainSelectionFailed { reason: String },
    TeamPickingStarted { first: Team, captain: String },
    PickTurn { captain: String },
    PlayerPicked { captain: String, player: String, team: Team },
    InvalidPick,
    KnifeRoundStarted,
    KnifeRoundWon { team: Team, captain: Option<String> },
    WaitingForSideChoice { captain: String },
    SideChosen { captain: String, choice: SideChoice },
    MatchStarted { map: Option<String> },
    MatchEnded,
    HalftimeSwap,
    TimeoutVoteStarted { team: Team, caller: String },
    TimeoutVotePassed { team: Team },
    TimeoutVoteFailed { team: Team },
    TimeoutPending { team: Team },
    TimeoutQueued { team: Team },
    TimeoutStarted { team: Team, seconds: u64 },
    TimeoutsRemaining { team: Team, remaining: u32, max: u32 },
    TimeoutTimeLeft { seconds: u64 },
    TimeoutEnded { team: Team },
    TimeoutSkipped { team: Team },
    InviteSent { by: String },
    InviteNotNeeded,
    MixReset { by: String },
    ForceStart { by: String },
    ForceReady { by: String },
    CommandReminder { command: String },
    TeamChangeBlocked { reason: String },
    Rejected { reason: String },
}

/// One side-effect intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    Broadcast { notice: Notice },
    Tell { player: PlayerId, notice: Notice },
    TellTeam { team: Team, notice: Notice },
    /// Reply to a command issued from the server console
    ConsoleReply { notice: Notice },
    Engine { command: EngineCommand },
    MovePlayer { player: PlayerId, team: Team },
    OpenMenu { player: PlayerId, menu: Menu },
    CloseMenu { player: PlayerId },
    /// Refuse a pending team change attempt
    BlockTeamChange { player: PlayerId, requested: Team },
    /// Ask the notifier to post an invite for the missing players
    SendInvite { missing_players: usize },
}

impl Effect {
    /// Routing key suffix used when the effect is published
    pub fn kind(&self) -> &'static str {
        match self {
            Effect::Broadcast { .. } => "broadcast",
            Effect::Tell { .. } => "tell",
            Effect::TellTeam { .. } => "tell_team",
            Effect::ConsoleReply { .. } => "console_reply",
            Effect::Engine { .. } => "engine",
            Effect::MovePlayer { .. } => "move_player",
            Effect::OpenMenu { .. } => "open_menu",
            Effect::CloseMenu { .. } => "close_menu",
            Effect::BlockTeamChange { .. } => "block_team_change",
            Effect::SendInvite { .. } => "send_invite",
        }
    }

    pub fn notice(&self) -> Option<&Notice> {
        match self {
            Effect::Broadcast { notice }
            | Effect::Tell { notice, .. }
            | Effect::TellTeam { notice, .. }
            | Effect::ConsoleReply { notice } => Some(notice),
            _ => None,
        }
    }
}
