//! Player identity lookups
//!
//! The orchestrator never holds live player objects. It keeps `PlayerRef`s
//! and re-resolves them through a [`PlayerDirectory`] every time it acts.

pub mod directory;

pub use directory::{InMemoryPlayerDirectory, PlayerDirectory};
