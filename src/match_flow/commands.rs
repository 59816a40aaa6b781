//! Chat and console command parsing

use crate::config::CommandInfo;
use crate::error::{MatchError, MatchResult};
use crate::types::{Issuer, Team};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Prefixes accepted in front of chat commands
const CHAT_PREFIXES: [char; 3] = ['!', '.', '/'];

/// A parsed, permission-checked command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Reset,
    ForceStart,
    ForceReady,
    /// Assign a captain; without a player the issuer gets a menu
    Captain { team: Team, player: Option<String> },
    ChangeMap { map: String },
    ListMaps,
    ListAllMaps,
    Ready,
    Unready,
    Revote,
    Timeout,
    Invite,
    Stay,
    Switch,
    VolunteerCaptain { team: Team },
}

impl Command {
    /// Canonical name as used in configuration
    pub fn name(&self) -> &'static str {
        match self {
            Command::Reset => "mix_reset",
            Command::ForceStart => "mix_start",
            Command::ForceReady => "forceready",
            Command::Captain { .. } => "captain",
            Command::ChangeMap { .. } => "map",
            Command::ListMaps => "maps",
            Command::ListAllMaps => "maplist_all",
            Command::Ready => "ready",
            Command::Unready => "unready",
            Command::Revote => "revote",
            Command::Timeout => "timeout",
            Command::Invite => "invite",
            Command::Stay => "stay",
            Command::Switch => "switch",
            Command::VolunteerCaptain { .. } => "volunteer_captain",
        }
    }

    /// Commands that only make sense for an in-game player
    pub fn requires_player(&self) -> bool {
        matches!(
            self,
            Command::Ready
                | Command::Unready
                | Command::Revote
                | Command::Timeout
                | Command::Invite
                | Command::Stay
                | Command::Switch
                | Command::VolunteerCaptain { .. }
        )
    }
}

#[derive(Debug, Clone)]
struct RegisteredCommand {
    canonical: String,
    permission: String,
}

/// Resolves names and aliases to commands and checks permissions
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    lookup: HashMap<String, RegisteredCommand>,
}

impl CommandRegistry {
    pub fn new(commands: &BTreeMap<String, CommandInfo>, allow_volunteer_captains: bool) -> Self {
        let mut lookup = HashMap::new();
        for (name, info) in commands {
            if name == "volunteer_captain" && !allow_volunteer_captains {
                continue;
            }
            let registered = RegisteredCommand {
                canonical: name.to_lowercase(),
                permission: info.permission.clone(),
            };
            for word in std::iter::once(name).chain(info.aliases.iter()) {
                lookup.insert(word.to_lowercase(), registered.clone());
            }
        }
        Self { lookup }
    }

    /// True when the line starts with a known command word
    pub fn is_command(&self, line: &str) -> bool {
        split_line(line).is_some_and(|(word, _)| self.lookup.contains_key(&word))
    }

    pub fn parse(&self, issuer: &Issuer, line: &str) -> MatchResult<Command> {
        let (word, args) = split_line(line).ok_or_else(|| MatchError::UnknownCommand {
            name: line.trim().to_string(),
        })?;
        let registered = self
            .lookup
            .get(&word)
            .ok_or_else(|| MatchError::UnknownCommand { name: word.clone() })?;

        if !issuer.has_permission(&registered.permission) {
            return Err(MatchError::PermissionDenied {
                command: registered.canonical.clone(),
                permission: registered.permission.clone(),
            });
        }

        let command = build(&registered.canonical, &args)?;
        if command.requires_player() && issuer.player_id().is_none() {
            return Err(MatchError::invalid_argument(format!(
                "'{}' can only be used by a player",
                command.name()
            )));
        }
        debug!("Parsed command '{}' as {:?}", line.trim(), command);
        Ok(command)
    }
}

fn split_line(line: &str) -> Option<(String, Vec<String>)> {
    let trimmed = line.trim().trim_start_matches(CHAT_PREFIXES);
    let mut parts = trimmed.split_whitespace();
    let word = parts.next()?.to_lowercase();
    Some((word, parts.map(str::to_string).collect()))
}

fn parse_team(args: &[String]) -> MatchResult<Team> {
    let arg = args
        .first()
        .ok_or_else(|| MatchError::invalid_argument("expected team t or ct"))?;
    Team::parse_side(arg)
        .ok_or_else(|| MatchError::invalid_argument(format!("invalid team '{}', use t or ct", arg)))
}

fn build(canonical: &str, args: &[String]) -> MatchResult<Command> {
    let command = match canonical {
        "mix_reset" => Command::Reset,
        "mix_start" => Command::ForceStart,
        "forceready" => Command::ForceReady,
        "captain" => Command::Captain {
            team: parse_team(args)?,
            player: (args.len() > 1).then(|| args[1..].join(" ")),
        },
        "map" => {
            if args.is_empty() {
                return Err(MatchError::invalid_argument("expected a map name"));
            }
            Command::ChangeMap {
                map: args.join(" "),
            }
        }
        "maps" => Command::ListMaps,
        "maplist_all" => Command::ListAllMaps,
        "ready" => Command::Ready,
        "unready" => Command::Unready,
        "revote" => Command::Revote,
        "timeout" => Command::Timeout,
        "invite" => Command::Invite,
        "stay" => Command::Stay,
        "switch" => Command::Switch,
        "volunteer_captain" => Command::VolunteerCaptain {
            team: parse_team(args)?,
        },
        other => {
            return Err(MatchError::UnknownCommand {
                name: other.to_string(),
            })
        }
    };
    Ok(command)
}
