//! Fixed delays used by the match flow

use std::time::Duration;

/// Between stopping the demo and issuing the change-level command
pub const MAP_CHANGE_DELAY: Duration = Duration::from_secs(5);
/// Loading announcement repeat while the map is loading
pub const MAP_LOADING_REANNOUNCE: Duration = Duration::from_secs(15);
/// After a map starts, before the warmup config is executed
pub const WARMUP_CONFIG_DELAY: Duration = Duration::from_secs(5);
/// After the warmup config, before the environment overrides
pub const OVERRIDES_CONFIG_DELAY: Duration = Duration::from_secs(3);
/// After a chosen map starts, before captains are selected
pub const CAPTAIN_SELECTION_DELAY: Duration = Duration::from_secs(30);
/// A newly connected player is assigned a team after this delay
pub const AUTO_ASSIGN_DELAY: Duration = Duration::from_secs(2);
/// Between a side decision and the swap or match start
pub const SIDE_CHOICE_DELAY: Duration = Duration::from_secs(1);
/// Halftime roster swap, and again before the move flag is cleared
pub const HALFTIME_SWAP_DELAY: Duration = Duration::from_secs(1);
/// Between the match-end signal and the full reset
pub const MATCH_END_RESET_DELAY: Duration = Duration::from_secs(10);
/// Timeout time-left announcement period
pub const TIMEOUT_ANNOUNCE_PERIOD: Duration = Duration::from_secs(15);
