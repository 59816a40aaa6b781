//! Recently played maps excluded from the next vote

use crate::config::MapEntry;
use std::collections::VecDeque;

/// Bounded list of played maps, oldest evicted first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayedMapHistory {
    capacity: usize,
    maps: VecDeque<String>,
}

impl PlayedMapHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            maps: VecDeque::with_capacity(capacity),
        }
    }

    /// Record a started match. A zero capacity keeps nothing.
    pub fn record(&mut self, map_name: &str) {
        if self.capacity == 0 {
            self.maps.clear();
            return;
        }
        self.maps.push_back(map_name.to_string());
        while self.maps.len() > self.capacity {
            self.maps.pop_front();
        }
    }

    pub fn contains(&self, map_name: &str) -> bool {
        self.maps.iter().any(|m| m.eq_ignore_ascii_case(map_name))
    }

    /// Voteable maps outside the cooldown window, in catalog order
    pub fn filter_available<'a>(
        &self,
        maps: impl Iterator<Item = &'a MapEntry>,
    ) -> Vec<MapEntry> {
        maps.filter(|m| !self.contains(&m.name)).cloned().collect()
    }

    pub fn maps(&self) -> impl Iterator<Item = &str> {
        self.maps.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}
