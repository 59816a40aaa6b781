//! Player rosters: readiness, captains and the team draft

pub mod captains;
pub mod draft;
pub mod ready;

pub use captains::CaptainSelector;
pub use draft::{DraftState, PurgeOutcome, RosterStage};
pub use ready::{ReadyChange, ReadyRoster};
