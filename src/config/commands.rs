//! Command names, permissions and aliases

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Permission required by administrative commands unless configured otherwise
pub const ADMIN_PERMISSION: &str = "managemix";

/// Role and aliases for one command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInfo {
    /// Required permission. Empty means anyone may use it.
    #[serde(default)]
    pub permission: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl CommandInfo {
    fn admin(aliases: &[&str]) -> Self {
        Self {
            permission: ADMIN_PERMISSION.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn player(aliases: &[&str]) -> Self {
        Self {
            permission: String::new(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Default command table keyed by canonical name
pub fn default_commands() -> BTreeMap<String, CommandInfo> {
    let mut commands = BTreeMap::new();
    commands.insert("mix_reset".to_string(), CommandInfo::admin(&["reset"]));
    commands.insert("mix_start".to_string(), CommandInfo::admin(&["start"]));
    commands.insert("forceready".to_string(), CommandInfo::admin(&["fr"]));
    commands.insert("captain".to_string(), CommandInfo::admin(&["cap", "capt"]));
    commands.insert("map".to_string(), CommandInfo::admin(&["changemap"]));
    commands.insert("maps".to_string(), CommandInfo::admin(&["maplist"]));
    commands.insert(
        "maplist_all".to_string(),
        CommandInfo::admin(&["allmaps", "maps_all"]),
    );
    commands.insert("ready".to_string(), CommandInfo::player(&["r"]));
    commands.insert("unready".to_string(), CommandInfo::player(&["u", "ur"]));
    commands.insert("revote".to_string(), CommandInfo::player(&["rv"]));
    commands.insert("timeout".to_string(), CommandInfo::player(&["pause"]));
    commands.insert("invite".to_string(), CommandInfo::player(&["inv"]));
    commands.insert("stay".to_string(), CommandInfo::player(&["st"]));
    commands.insert("switch".to_string(), CommandInfo::player(&["swap"]));
    commands.insert(
        "volunteer_captain".to_string(),
        CommandInfo::player(&["volcap", "selfcapt"]),
    );
    commands
}
