//! One-vote-per-voter map tally

use crate::config::MapEntry;
use crate::types::PlayerId;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Effect of registering a vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteChange {
    Registered,
    /// The voter moved their vote away from the named map
    Switched { from: String },
    /// Same map as before; nothing changed
    Unchanged,
}

/// Winner of a closed vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteResolution {
    pub map: MapEntry,
    pub votes: usize,
    /// True when nobody voted and the map was drawn at random
    pub random: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TallyEntry {
    map: MapEntry,
    voters: Vec<PlayerId>,
}

/// Votes per map, each entry created when the map receives its first vote.
///
/// Entries are kept in creation order even after they drop to zero votes,
/// which is what decides ties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapVoteTally {
    entries: Vec<TallyEntry>,
}

impl MapVoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_vote(&mut self, voter: PlayerId, map: &MapEntry) -> VoteChange {
        let previous = self.entries.iter().position(|e| e.voters.contains(&voter));
        if let Some(index) = previous {
            if self.entries[index].map.name == map.name {
                return VoteChange::Unchanged;
            }
        }

        let change = match previous {
            Some(index) => {
                let entry = &mut self.entries[index];
                entry.voters.retain(|v| *v != voter);
                VoteChange::Switched {
                    from: entry.map.name.clone(),
                }
            }
            None => VoteChange::Registered,
        };

        match self.entries.iter_mut().find(|e| e.map.name == map.name) {
            Some(entry) => entry.voters.push(voter),
            None => self.entries.push(TallyEntry {
                map: map.clone(),
                voters: vec![voter],
            }),
        }

        debug!(
            "Map vote - voter: {}, map: '{}', change: {:?}",
            voter, map.name, change
        );
        change
    }

    /// Remove a voter's ballot. Returns the map it was counted for.
    pub fn withdraw(&mut self, voter: PlayerId) -> Option<String> {
        let entry = self.entries.iter_mut().find(|e| e.voters.contains(&voter))?;
        entry.voters.retain(|v| *v != voter);
        Some(entry.map.name.clone())
    }

    pub fn votes_for(&self, map_name: &str) -> usize {
        self.entries
            .iter()
            .find(|e| e.map.name == map_name)
            .map_or(0, |e| e.voters.len())
    }

    pub fn choice_of(&self, voter: PlayerId) -> Option<&MapEntry> {
        self.entries
            .iter()
            .find(|e| e.voters.contains(&voter))
            .map(|e| &e.map)
    }

    /// Number of active ballots across all maps
    pub fn total_votes(&self) -> usize {
        self.entries.iter().map(|e| e.voters.len()).sum()
    }

    /// Highest tally; ties go to the entry created first
    pub fn leader(&self) -> Option<(&MapEntry, usize)> {
        let mut best: Option<&TallyEntry> = None;
        for entry in &self.entries {
            if entry.voters.is_empty() {
                continue;
            }
            if best.map_or(true, |b| entry.voters.len() > b.voters.len()) {
                best = Some(entry);
            }
        }
        best.map(|e| (&e.map, e.voters.len()))
    }

    /// Close the vote. Without any ballots a map is drawn uniformly from
    /// `fallback`; `None` only when there are no votes and no fallback maps.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        fallback: &[MapEntry],
        rng: &mut R,
    ) -> Option<VoteResolution> {
        if let Some((map, votes)) = self.leader() {
            info!("Map vote resolved - map: '{}', votes: {}", map.name, votes);
            return Some(VoteResolution {
                map: map.clone(),
                votes,
                random: false,
            });
        }

        let map = fallback.choose(rng)?;
        info!(
            "Map vote had no ballots - picked '{}' at random from {} maps",
            map.name,
            fallback.len()
        );
        Some(VoteResolution {
            map: map.clone(),
            votes: 0,
            random: true,
        })
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_map_catalog;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn map(name: &str) -> MapEntry {
        MapEntry::standard(name, name)
    }

    #[test]
    fn test_switching_moves_single_ballot() {
        let mut tally = MapVoteTally::new();
        assert_eq!(tally.register_vote(1, &map("de_mirage")), VoteChange::Registered);
        assert_eq!(
            tally.register_vote(1, &map("de_dust2")),
            VoteChange::Switched {
                from: "de_mirage".to_string()
            }
        );
        assert_eq!(tally.register_vote(1, &map("de_dust2")), VoteChange::Unchanged);
        assert_eq!(tally.votes_for("de_mirage"), 0);
        assert_eq!(tally.votes_for("de_dust2"), 1);
        assert_eq!(tally.total_votes(), 1);
    }

    #[test]
    fn test_highest_tally_wins() {
        let mut tally = MapVoteTally::new();
        for voter in 0..2 {
            tally.register_vote(voter, &map("de_dust2"));
        }
        for voter in 2..5 {
            tally.register_vote(voter, &map("de_mirage"));
        }
        let mut rng = StdRng::seed_from_u64(0);
        let resolution = tally.resolve(&[], &mut rng).unwrap();
        assert_eq!(resolution.map.name, "de_mirage");
        assert_eq!(resolution.votes, 3);
        assert!(!resolution.random);
    }

    #[test]
    fn test_tie_goes_to_first_voted_map() {
        let mut tally = MapVoteTally::new();
        tally.register_vote(1, &map("de_nuke"));
        tally.register_vote(2, &map("de_inferno"));
        tally.register_vote(3, &map("de_inferno"));
        tally.register_vote(4, &map("de_nuke"));
        assert_eq!(tally.leader().unwrap().0.name, "de_nuke");
    }

    #[test]
    fn test_no_votes_draws_from_fallback() {
        let tally = MapVoteTally::new();
        let fallback = default_map_catalog();
        let mut rng = StdRng::seed_from_u64(11);
        let resolution = tally.resolve(&fallback, &mut rng).unwrap();
        assert!(resolution.random);
        assert_eq!(resolution.votes, 0);
        assert!(fallback.contains(&resolution.map));
        assert!(tally.resolve(&[], &mut rng).is_none());
    }

    #[test]
    fn test_withdraw_removes_ballot() {
        let mut tally = MapVoteTally::new();
        tally.register_vote(1, &map("de_vertigo"));
        assert_eq!(tally.withdraw(1), Some("de_vertigo".to_string()));
        assert_eq!(tally.withdraw(1), None);
        assert!(tally.leader().is_none());
    }
}
