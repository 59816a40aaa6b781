//! Utility functions for the match service

use crate::types::PlayerId;
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

/// Generate a correlation ID for published messages
pub fn generate_correlation_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Render a remaining cooldown as `Xmin Ys`
pub fn format_cooldown(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!("{}min {}s", secs / 60, secs % 60)
}

/// Fill the leave-punishment command template
pub fn format_punishment_command(
    template: &str,
    steam_id: PlayerId,
    reason: &str,
    duration_minutes: u64,
) -> String {
    template
        .replace("{steamId}", &steam_id.to_string())
        .replace("{reason}", reason)
        .replace("{duration}", &duration_minutes.to_string())
}

/// Fill an invite message template: `{0}` missing players, `{1}` server address
pub fn format_invite_message(template: &str, missing_players: usize, address: &str) -> String {
    template
        .replace("{0}", &missing_players.to_string())
        .replace("{1}", address)
}
