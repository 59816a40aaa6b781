//! Map voting and the played-map cooldown

pub mod history;
pub mod tally;

pub use history::PlayedMapHistory;
pub use tally::{MapVoteTally, VoteChange, VoteResolution};
