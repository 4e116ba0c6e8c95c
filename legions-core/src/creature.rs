//! Creature type definitions and per-instance creature state

use crate::battlemap::{BattleHexId, Hazard, Hexside};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of creature types in the table
pub const NUM_CREATURE_TYPES: usize = 24;

/// Lord, demi-lord or ordinary creature
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Character {
    Lord,
    DemiLord,
    Creature,
}

/// Ranged attack class
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rangestrike {
    None,
    Rangestrike,
    /// Rangestrikes that may target lords
    MagicMissile,
}

/// Creature type definition
#[derive(Clone, Debug)]
pub struct CreatureType {
    pub name: &'static str,
    pub power: u8,
    pub skill: u8,
    pub rangestrike: Rangestrike,
    pub flies: bool,
    pub character: Character,
    pub summonable: bool,
    /// Point interval at which this creature can be acquired (0 = never)
    pub acquirable_every: u32,
    pub max_count: u16,
    pub native_hazards: &'static [Hazard],
    pub native_hexsides: &'static [Hexside],
}

impl CreatureType {
    #[allow(clippy::too_many_arguments)]
    const fn new(
        name: &'static str,
        power: u8,
        skill: u8,
        rangestrike: Rangestrike,
        flies: bool,
        character: Character,
        max_count: u16,
        native_hazards: &'static [Hazard],
        native_hexsides: &'static [Hexside],
    ) -> Self {
        Self {
            name,
            power,
            skill,
            rangestrike,
            flies,
            character,
            summonable: false,
            acquirable_every: 0,
            max_count,
            native_hazards,
            native_hexsides,
        }
    }

    const fn angelic(mut self, acquirable_every: u32) -> Self {
        self.summonable = true;
        self.acquirable_every = acquirable_every;
        self
    }
}

use Character::{Creature as Common, DemiLord, Lord};
use Hazard::{Bog, Bramble, Drift, Sand, Volcano};
use Hexside::{Dune, Slope};
use Rangestrike::{MagicMissile, None as NoRs, Rangestrike as Rs};

/// All creature types, sorted by name
pub static CREATURE_TYPES: [CreatureType; NUM_CREATURE_TYPES] = [
    CreatureType::new("Angel", 6, 4, NoRs, true, Lord, 18, &[], &[]).angelic(100),
    CreatureType::new("Archangel", 9, 4, NoRs, true, Lord, 6, &[], &[]).angelic(500),
    CreatureType::new("Behemoth", 8, 3, NoRs, false, Common, 18, &[Bramble], &[]),
    CreatureType::new("Centaur", 3, 4, NoRs, false, Common, 25, &[], &[]),
    CreatureType::new("Colossus", 10, 4, NoRs, false, Common, 10, &[], &[Slope]),
    CreatureType::new("Cyclops", 9, 2, NoRs, false, Common, 28, &[Bramble], &[]),
    CreatureType::new("Dragon", 9, 3, Rs, true, Common, 18, &[Volcano], &[Slope]),
    CreatureType::new("Gargoyle", 4, 3, NoRs, true, Common, 21, &[Bramble], &[]),
    CreatureType::new("Giant", 7, 4, Rs, false, Common, 18, &[Drift], &[]),
    CreatureType::new("Gorgon", 6, 3, Rs, true, Common, 25, &[Bramble], &[]),
    CreatureType::new("Griffon", 5, 4, NoRs, true, Common, 18, &[Sand], &[Dune]),
    CreatureType::new("Guardian", 12, 2, NoRs, true, DemiLord, 6, &[], &[]),
    CreatureType::new("Hydra", 10, 3, Rs, false, Common, 10, &[Bog, Sand], &[Dune]),
    CreatureType::new("Lion", 5, 3, NoRs, false, Common, 28, &[Sand], &[Dune, Slope]),
    CreatureType::new("Minotaur", 4, 4, Rs, false, Common, 21, &[], &[Slope]),
    CreatureType::new("Ogre", 6, 2, NoRs, false, Common, 25, &[Bog], &[]),
    CreatureType::new("Ranger", 4, 4, Rs, true, Common, 28, &[Bog], &[]),
    CreatureType::new("Serpent", 18, 2, NoRs, false, Common, 10, &[Bramble], &[]),
    CreatureType::new("Titan", 6, 4, NoRs, false, Lord, 6, &[], &[]),
    CreatureType::new("Troll", 8, 2, NoRs, false, Common, 28, &[Bog, Drift], &[]),
    CreatureType::new("Unicorn", 6, 4, NoRs, false, Common, 12, &[], &[Slope]),
    CreatureType::new("Warbear", 6, 3, NoRs, false, Common, 21, &[Drift], &[]),
    CreatureType::new("Warlock", 5, 4, MagicMissile, false, DemiLord, 6, &[], &[]),
    CreatureType::new("Wyvern", 7, 3, NoRs, true, Common, 18, &[Bog], &[]),
];

// ============================================================================
// CREATURE KIND
// ============================================================================

/// Creature type identifier (index into CREATURE_TYPES), serialized by name
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CreatureKind(u8);

impl CreatureKind {
    pub const ANGEL: Self = Self(0);
    pub const ARCHANGEL: Self = Self(1);
    pub const BEHEMOTH: Self = Self(2);
    pub const CENTAUR: Self = Self(3);
    pub const COLOSSUS: Self = Self(4);
    pub const CYCLOPS: Self = Self(5);
    pub const DRAGON: Self = Self(6);
    pub const GARGOYLE: Self = Self(7);
    pub const GIANT: Self = Self(8);
    pub const GORGON: Self = Self(9);
    pub const GRIFFON: Self = Self(10);
    pub const GUARDIAN: Self = Self(11);
    pub const HYDRA: Self = Self(12);
    pub const LION: Self = Self(13);
    pub const MINOTAUR: Self = Self(14);
    pub const OGRE: Self = Self(15);
    pub const RANGER: Self = Self(16);
    pub const SERPENT: Self = Self(17);
    pub const TITAN: Self = Self(18);
    pub const TROLL: Self = Self(19);
    pub const UNICORN: Self = Self(20);
    pub const WARBEAR: Self = Self(21);
    pub const WARLOCK: Self = Self(22);
    pub const WYVERN: Self = Self(23);

    /// Look up a creature kind by its name
    pub fn from_name(name: &str) -> Option<Self> {
        CREATURE_TYPES
            .iter()
            .position(|t| t.name == name)
            .map(|i| Self(i as u8))
    }

    /// All creature kinds in table order
    pub fn all() -> impl Iterator<Item = CreatureKind> {
        (0..NUM_CREATURE_TYPES as u8).map(CreatureKind)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn data(self) -> &'static CreatureType {
        &CREATURE_TYPES[self.index()]
    }

    pub fn name(self) -> &'static str {
        self.data().name
    }

    pub fn is_lord(self) -> bool {
        self.data().character == Character::Lord
    }

    pub fn is_titan(self) -> bool {
        self == Self::TITAN
    }

    /// Ordinary creatures, the ones counted by the "any creature" recruit joker
    pub fn is_ordinary(self) -> bool {
        self.data().character == Character::Creature
    }

    /// Lords and demi-lords go back to the pool instead of the graveyard
    pub fn returns_to_pool_on_death(self) -> bool {
        self.data().character != Character::Creature
    }

    /// Base point value (power x skill) using the table power
    pub fn score(self) -> u32 {
        let data = self.data();
        data.power as u32 * data.skill as u32
    }

    /// Sort value using the table power
    pub fn sort_value(self) -> f64 {
        sort_value(self, self.data().power)
    }
}

impl fmt::Debug for CreatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for CreatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for CreatureKind {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        CreatureKind::from_name(&name).ok_or_else(|| format!("unknown creature {name}"))
    }
}

impl From<CreatureKind> for String {
    fn from(kind: CreatureKind) -> Self {
        kind.name().to_string()
    }
}

/// Ranking used by the AI and for display ordering. Point value dominates;
/// the fractional terms break ties between creatures of equal value.
fn sort_value(kind: CreatureKind, power: u8) -> f64 {
    let data = kind.data();
    let mut value = power as f64 * data.skill as f64;
    if data.acquirable_every > 0 {
        value += 0.2;
    }
    if data.flies {
        value += 0.3;
    }
    match data.rangestrike {
        Rangestrike::None => {}
        Rangestrike::Rangestrike => value += 0.25,
        Rangestrike::MagicMissile => value += 0.35,
    }
    match data.skill {
        2 => value += 0.15,
        4 => value += 0.18,
        _ => {}
    }
    if kind.is_titan() {
        value += 100.0;
    }
    value
}

// ============================================================================
// CREATURE INSTANCE
// ============================================================================

/// A creature in a legion. Battle fields are only meaningful during a battle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creature {
    pub kind: CreatureKind,
    /// Current power (titans grow with their owner's score)
    pub power: u8,
    /// Damage taken in the current battle
    pub hits: u8,
    /// Battle hex, None while waiting at the entrance
    pub hex: Option<BattleHexId>,
    pub previous_hex: Option<BattleHexId>,
    pub moved: bool,
    pub struck: bool,
}

impl Creature {
    pub fn new(kind: CreatureKind) -> Self {
        Self {
            kind,
            power: kind.data().power,
            hits: 0,
            hex: None,
            previous_hex: None,
            moved: false,
            struck: false,
        }
    }

    /// A titan whose power reflects its owner's score
    pub fn titan(player_score: u32) -> Self {
        let mut creature = Self::new(CreatureKind::TITAN);
        creature.power = titan_power(player_score);
        creature
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn skill(&self) -> u8 {
        self.kind.data().skill
    }

    pub fn flies(&self) -> bool {
        self.kind.data().flies
    }

    pub fn is_lord(&self) -> bool {
        self.kind.is_lord()
    }

    pub fn is_titan(&self) -> bool {
        self.kind.is_titan()
    }

    pub fn hits_left(&self) -> u8 {
        self.power.saturating_sub(self.hits)
    }

    pub fn is_dead(&self) -> bool {
        self.hits >= self.power
    }

    pub fn score(&self) -> u32 {
        self.power as u32 * self.skill() as u32
    }

    pub fn sort_value(&self) -> f64 {
        sort_value(self.kind, self.power)
    }

    /// Rough fighting strength, reduced by damage taken
    pub fn combat_value(&self) -> f64 {
        let data = self.kind.data();
        let mut factor = 1.0;
        if data.flies {
            factor += 0.1;
        }
        if data.rangestrike != Rangestrike::None {
            factor += 0.1;
        }
        self.hits_left() as f64 * data.skill as f64 * factor
    }

    pub fn is_native(&self, hazard: Hazard) -> bool {
        self.kind.data().native_hazards.contains(&hazard)
    }

    pub fn is_native_hexside(&self, hexside: Hexside) -> bool {
        self.kind.data().native_hexsides.contains(&hexside)
    }

    /// Clear all battle state
    pub fn reset_battle_state(&mut self) {
        self.hits = 0;
        self.hex = None;
        self.previous_hex = None;
        self.moved = false;
        self.struck = false;
    }
}

/// Titan power for a given player score
pub fn titan_power(player_score: u32) -> u8 {
    (6 + player_score / 100).min(u8::MAX as u32) as u8
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(CreatureKind::from_name("Titan"), Some(CreatureKind::TITAN));
        assert_eq!(CreatureKind::from_name("Wyvern"), Some(CreatureKind::WYVERN));
        assert_eq!(CreatureKind::from_name("Unicorn"), Some(CreatureKind::UNICORN));
        assert_eq!(CreatureKind::from_name("Hobbit"), None);
        for kind in CreatureKind::all() {
            assert_eq!(CreatureKind::from_name(kind.name()), Some(kind));
        }
    }

    #[test]
    fn test_score() {
        assert_eq!(CreatureKind::OGRE.score(), 12);
        assert_eq!(CreatureKind::SERPENT.score(), 36);
        assert_eq!(Creature::new(CreatureKind::ANGEL).score(), 24);
    }

    #[test]
    fn test_sort_value_ordering() {
        let ordered = [
            CreatureKind::ARCHANGEL,
            CreatureKind::SERPENT,
            CreatureKind::RANGER,
            CreatureKind::MINOTAUR,
            CreatureKind::GARGOYLE,
            CreatureKind::CENTAUR,
            CreatureKind::OGRE,
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0].sort_value() > pair[1].sort_value(), "{:?}", pair);
        }
        assert!(CreatureKind::TITAN.sort_value() > 100.0);
    }

    #[test]
    fn test_character_classes() {
        assert!(CreatureKind::TITAN.is_lord());
        assert!(CreatureKind::ANGEL.is_lord());
        assert!(!CreatureKind::WARLOCK.is_lord());
        assert!(CreatureKind::WARLOCK.returns_to_pool_on_death());
        assert!(!CreatureKind::OGRE.returns_to_pool_on_death());
        assert!(CreatureKind::OGRE.is_ordinary());
        assert!(!CreatureKind::GUARDIAN.is_ordinary());
    }

    #[test]
    fn test_titan_power_grows_with_score() {
        assert_eq!(titan_power(0), 6);
        assert_eq!(titan_power(120), 7);
        assert_eq!(titan_power(1000), 16);
        assert_eq!(Creature::titan(250).hits_left(), 8);
    }

    #[test]
    fn test_damage_and_combat_value() {
        let mut troll = Creature::new(CreatureKind::TROLL);
        assert_eq!(troll.hits_left(), 8);
        let fresh = troll.combat_value();
        troll.hits = 5;
        assert_eq!(troll.hits_left(), 3);
        assert!(troll.combat_value() < fresh);
        assert!(!troll.is_dead());
        troll.hits = 8;
        assert!(troll.is_dead());
    }

    #[test]
    fn test_kind_serializes_by_name() {
        let json = serde_json::to_string(&CreatureKind::GORGON).unwrap();
        assert_eq!(json, "\"Gorgon\"");
        let back: CreatureKind = serde_json::from_str("\"Hydra\"").unwrap();
        assert_eq!(back, CreatureKind::HYDRA);
        assert!(serde_json::from_str::<CreatureKind>("\"Hobbit\"").is_err());
    }
}
