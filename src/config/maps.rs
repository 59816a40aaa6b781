//! Map catalog configuration

use serde::{Deserialize, Serialize};

/// A map the server can load, as declared in configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapEntry {
    /// Engine map name, e.g. `de_mirage`
    pub name: String,
    /// Name shown to players in votes and announcements
    pub display_name: String,
    #[serde(default)]
    pub workshop_id: Option<String>,
    #[serde(default = "default_true")]
    pub can_be_voted: bool,
    #[serde(default)]
    pub is_workshop: bool,
}

fn default_true() -> bool {
    true
}

impl MapEntry {
    pub fn standard(name: &str, display_name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            workshop_id: None,
            can_be_voted: true,
            is_workshop: false,
        }
    }

    pub fn workshop(name: &str, display_name: &str, workshop_id: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            workshop_id: Some(workshop_id.to_string()),
            can_be_voted: true,
            is_workshop: true,
        }
    }

    /// True when either the engine name or the display name matches, ignoring case
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim();
        self.name.eq_ignore_ascii_case(query) || self.display_name.eq_ignore_ascii_case(query)
    }

    /// Workshop id to load with, when the entry is a workshop map with an id set
    pub fn workshop_target(&self) -> Option<&str> {
        if !self.is_workshop {
            return None;
        }
        self.workshop_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Catalog shipped with the default configuration
pub fn default_map_catalog() -> Vec<MapEntry> {
    vec![
        MapEntry::standard("de_mirage", "Mirage"),
        MapEntry::standard("de_dust2", "Dust2"),
        MapEntry::standard("de_inferno", "Inferno"),
        MapEntry::standard("de_anubis", "Anubis"),
        MapEntry::standard("de_overpass", "Overpass"),
        MapEntry::standard("de_ancient", "Ancient"),
        MapEntry::standard("de_ancient_night", "Ancient Night"),
        MapEntry::standard("de_nuke", "Nuke"),
        MapEntry::standard("de_vertigo", "Vertigo"),
    ]
}

/// Immutable view over the configured maps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapCatalog {
    maps: Vec<MapEntry>,
}

impl MapCatalog {
    pub fn new(maps: Vec<MapEntry>) -> Self {
        Self { maps }
    }

    pub fn all(&self) -> &[MapEntry] {
        &self.maps
    }

    pub fn voteable(&self) -> impl Iterator<Item = &MapEntry> {
        self.maps.iter().filter(|m| m.can_be_voted)
    }

    /// Lookup by engine or display name
    pub fn find(&self, query: &str) -> Option<&MapEntry> {
        self.maps.iter().find(|m| m.matches(query))
    }

    /// The map loaded after a full reset
    pub fn first(&self) -> Option<&MapEntry> {
        self.maps.first()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

impl Default for MapCatalog {
    fn default() -> Self {
        Self::new(default_map_catalog())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_by_engine_or_display_name() {
        let catalog = MapCatalog::default();
        assert_eq!(catalog.find("DE_MIRAGE").unwrap().display_name, "Mirage");
        assert_eq!(catalog.find("ancient night").unwrap().name, "de_ancient_night");
        assert!(catalog.find("de_cache").is_none());
    }

    #[test]
    fn test_workshop_target_requires_flag_and_id() {
        let mut map = MapEntry::workshop("aim_map", "Aim", "123456");
        assert_eq!(map.workshop_target(), Some("123456"));
        map.workshop_id = Some("  ".to_string());
        assert_eq!(map.workshop_target(), None);
        assert_eq!(MapEntry::standard("de_nuke", "Nuke").workshop_target(), None);
    }

    #[test]
    fn test_voteable_filters_flag() {
        let mut maps = default_map_catalog();
        maps[0].can_be_voted = false;
        let catalog = MapCatalog::new(maps);
        assert_eq!(catalog.voteable().count(), 8);
        assert_eq!(catalog.first().unwrap().name, "de_mirage");
    }
}
