//! Players: legions, marker supply, per-turn flags and score

use crate::board::HexLabel;
use crate::creature::titan_power;
use crate::error::{invariant, Result};
use crate::legion::Legion;
use crate::phase::Phase;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Markers per color
pub const MARKERS_PER_COLOR: u8 = 12;

/// Player color, which fixes the marker names
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Color {
    Red,
    Blue,
    Black,
    Brown,
    Green,
    Gold,
}

impl Color {
    pub const ALL: [Color; 6] = [
        Color::Red,
        Color::Blue,
        Color::Black,
        Color::Brown,
        Color::Green,
        Color::Gold,
    ];

    /// Two-letter marker prefix
    pub fn abbrev(self) -> &'static str {
        match self {
            Color::Red => "Rd",
            Color::Blue => "Bu",
            Color::Black => "Bk",
            Color::Brown => "Br",
            Color::Green => "Gr",
            Color::Gold => "Gd",
        }
    }

    /// All marker names of this color
    pub fn markers(self) -> impl Iterator<Item = String> {
        (1..=MARKERS_PER_COLOR).map(move |n| format!("{}{:02}", self.abbrev(), n))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub color: Option<Color>,
    pub starting_tower: Option<HexLabel>,
    pub legions: BTreeMap<String, Legion>,
    /// Unused markers
    pub markers: BTreeSet<String>,
    pub score: u32,
    pub movement_roll: u8,
    pub mulligans_left: u8,
    /// Whether a legion teleported this turn
    pub teleported: bool,
    pub dead: bool,
    /// Turn and phase of the last phase this player finished
    #[serde(default)]
    pub last_done: Option<(u32, Phase)>,
}

impl Player {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            color: None,
            starting_tower: None,
            legions: BTreeMap::new(),
            markers: BTreeSet::new(),
            score: 0,
            movement_roll: 0,
            mulligans_left: 1,
            teleported: false,
            dead: false,
            last_done: None,
        }
    }

    pub fn assign_color(&mut self, color: Color) {
        self.color = Some(color);
        self.markers = color.markers().collect();
    }

    pub fn legion(&self, marker: &str) -> Option<&Legion> {
        self.legions.get(marker)
    }

    pub fn legion_mut(&mut self, marker: &str) -> Option<&mut Legion> {
        self.legions.get_mut(marker)
    }

    /// Take an unused marker out of the supply
    pub fn take_marker(&mut self, marker: &str) -> Result<()> {
        if !self.markers.remove(marker) {
            return invariant(format!("{} does not hold marker {}", self.name, marker));
        }
        Ok(())
    }

    pub fn add_legion(&mut self, legion: Legion) -> Result<()> {
        if self.legions.contains_key(&legion.marker) {
            return invariant(format!("duplicate marker {}", legion.marker));
        }
        self.legions.insert(legion.marker.clone(), legion);
        Ok(())
    }

    /// Remove a legion and return its marker to the supply
    pub fn remove_legion(&mut self, marker: &str) -> Result<Legion> {
        match self.legions.remove(marker) {
            Some(legion) => {
                self.markers.insert(marker.to_string());
                Ok(legion)
            }
            None => invariant(format!("{} has no legion {}", self.name, marker)),
        }
    }

    pub fn legions_in(&self, hex: HexLabel) -> impl Iterator<Item = &Legion> {
        self.legions.values().filter(move |l| l.hex == hex)
    }

    pub fn has_titan(&self) -> bool {
        self.legions.values().any(|l| l.has_titan())
    }

    pub fn titan_legion(&self) -> Option<&Legion> {
        self.legions.values().find(|l| l.has_titan())
    }

    pub fn can_split(&self, turn: u32) -> bool {
        !self.markers.is_empty() && self.legions.values().any(|l| l.can_be_split(turn))
    }

    pub fn moved_legions(&self) -> usize {
        self.legions.values().filter(|l| l.moved).count()
    }

    /// Sum of all legion point values
    pub fn legion_points(&self) -> u32 {
        self.legions.values().map(|l| l.score()).sum()
    }

    pub fn add_score(&mut self, points: u32) {
        self.score += points;
        let power = titan_power(self.score);
        for legion in self.legions.values_mut() {
            legion.set_titan_power(power);
        }
    }

    /// Clear per-turn state at the start of this player's turn
    pub fn reset_turn(&mut self) {
        self.movement_roll = 0;
        self.teleported = false;
        for legion in self.legions.values_mut() {
            legion.reset_turn();
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creature::{Creature, CreatureKind};
    use crate::legion::STARTING_CREATURES;

    fn player_with_legion() -> Player {
        let mut player = Player::new("p0");
        player.assign_color(Color::Red);
        player.take_marker("Rd01").unwrap();
        let creatures = STARTING_CREATURES.iter().map(|&k| Creature::new(k)).collect();
        player.add_legion(Legion::new("Rd01", "p0", 100, creatures)).unwrap();
        player
    }

    #[test]
    fn test_markers() {
        let player = player_with_legion();
        assert_eq!(player.markers.len(), 11);
        assert!(!player.markers.contains("Rd01"));
        assert!(player.markers.contains("Rd12"));
        assert_eq!(Color::Gold.markers().next().as_deref(), Some("Gd01"));
    }

    #[test]
    fn test_take_marker_twice_fails() {
        let mut player = player_with_legion();
        assert!(player.take_marker("Rd01").is_err());
        assert!(player.take_marker("Bu01").is_err());
        player.take_marker("Rd02").unwrap();
    }

    #[test]
    fn test_remove_legion_returns_marker() {
        let mut player = player_with_legion();
        let legion = player.remove_legion("Rd01").unwrap();
        assert_eq!(legion.height(), 8);
        assert!(player.markers.contains("Rd01"));
        assert!(player.remove_legion("Rd01").is_err());
    }

    #[test]
    fn test_score_grows_titan() {
        let mut player = player_with_legion();
        player.add_score(230);
        let legion = player.titan_legion().unwrap();
        let titan = legion.creatures.iter().find(|c| c.kind == CreatureKind::TITAN).unwrap();
        assert_eq!(titan.power, 8);
    }

    #[test]
    fn test_can_split() {
        let player = player_with_legion();
        assert!(player.can_split(1));
        assert_eq!(player.legion_points(), 120);
        assert_eq!(player.legions_in(100).count(), 1);
    }
}
