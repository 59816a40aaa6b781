//! Decision strategies for humans and bots
//!
//! Every decision point (draft pick, side pick, timeout ballot) asks the
//! actor's [`Decider`]. Humans are prompted through a menu and answer later
//! with a selection event; bots answer on the spot.

use crate::types::{Ballot, PlayerRef, SideChoice};
use rand::seq::SliceRandom;
use rand::RngCore;

/// Immediate answer, or a prompt the actor answers later
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision<T> {
    Now(T),
    Prompt,
}

pub trait Decider: Send + Sync {
    fn is_automatic(&self) -> bool;

    /// Choose a player from the remaining draft pool
    fn pick_player(&self, pool: &[PlayerRef], rng: &mut dyn RngCore) -> Decision<PlayerRef>;

    /// Stay or switch after winning the knife round
    fn choose_side(&self) -> Decision<SideChoice>;

    fn timeout_ballot(&self) -> Decision<Ballot>;
}

/// Prompts the player and waits for their selection
#[derive(Debug, Clone, Copy, Default)]
pub struct HumanDecider;

impl Decider for HumanDecider {
    fn is_automatic(&self) -> bool {
        false
    }

    fn pick_player(&self, _pool: &[PlayerRef], _rng: &mut dyn RngCore) -> Decision<PlayerRef> {
        Decision::Prompt
    }

    fn choose_side(&self) -> Decision<SideChoice> {
        Decision::Prompt
    }

    fn timeout_ballot(&self) -> Decision<Ballot> {
        Decision::Prompt
    }
}

/// Picks randomly, always switches sides and always agrees to timeouts
#[derive(Debug, Clone, Copy, Default)]
pub struct BotDecider;

impl Decider for BotDecider {
    fn is_automatic(&self) -> bool {
        true
    }

    fn pick_player(&self, pool: &[PlayerRef], rng: &mut dyn RngCore) -> Decision<PlayerRef> {
        match pool.choose(rng) {
            Some(player) => Decision::Now(player.clone()),
            None => Decision::Prompt,
        }
    }

    fn choose_side(&self) -> Decision<SideChoice> {
        Decision::Now(SideChoice::Switch)
    }

    fn timeout_ballot(&self) -> Decision<Ballot> {
        Decision::Now(Ballot::Yes)
    }
}

static HUMAN: HumanDecider = HumanDecider;
static BOT: BotDecider = BotDecider;

/// Strategy for an actor, chosen once from the directory's bot flag
pub fn decider_for(is_bot: bool) -> &'static dyn Decider {
    if is_bot {
        &BOT
    } else {
        &HUMAN
    }
}
