//! Battle boards
//!
//! Each master terrain has its own tactical map: a radius-3 hex region (37
//! hexes) labelled by column letter A-G (west to east) and row number (north
//! to south). Hexes carry a hazard and an elevation, and hexsides may carry
//! cliffs, slopes, walls or dunes. The attacker enters from the west edge,
//! the defender from the east edge.

use crate::board::{opposite, Hex, Terrain};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Index into a battle map's hex list
pub type BattleHexId = u8;

/// Battle map radius
pub const BATTLE_RADIUS: i8 = 3;

/// Hex hazard
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hazard {
    Plain,
    Bramble,
    Bog,
    Drift,
    Sand,
    Tree,
    Volcano,
    Tower,
}

/// Hexside feature
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hexside {
    Open,
    Cliff,
    Slope,
    Wall,
    Dune,
}

/// Which legion in a battle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BattleSide {
    Attacker,
    Defender,
}

impl BattleSide {
    pub fn other(self) -> Self {
        match self {
            BattleSide::Attacker => BattleSide::Defender,
            BattleSide::Defender => BattleSide::Attacker,
        }
    }
}

/// A hex on a battle map
#[derive(Clone, Debug)]
pub struct BattleHex {
    pub id: BattleHexId,
    pub label: String,
    pub hex: Hex,
    pub hazard: Hazard,
    pub elevation: u8,
    /// Features by direction (N, NE, SE, S, SW, NW), as seen from this hex
    pub hexsides: [Hexside; 6],
}

/// A complete battle map for one terrain
#[derive(Clone, Debug)]
pub struct BattleMap {
    pub terrain: Terrain,
    hexes: Vec<BattleHex>,
    attacker_entry: Vec<BattleHexId>,
    defender_entry: Vec<BattleHexId>,
}

impl BattleMap {
    /// The shared map for a terrain
    pub fn for_terrain(terrain: Terrain) -> &'static BattleMap {
        let index = Terrain::ALL.iter().position(|&t| t == terrain).unwrap_or(0);
        &BATTLE_MAPS[index]
    }

    pub fn hexes(&self) -> &[BattleHex] {
        &self.hexes
    }

    pub fn hex(&self, id: BattleHexId) -> &BattleHex {
        &self.hexes[id as usize]
    }

    pub fn label(&self, id: BattleHexId) -> &str {
        &self.hexes[id as usize].label
    }

    pub fn by_label(&self, label: &str) -> Option<BattleHexId> {
        self.hexes.iter().find(|h| h.label == label).map(|h| h.id)
    }

    pub fn at(&self, hex: Hex) -> Option<BattleHexId> {
        self.hexes.iter().find(|h| h.hex == hex).map(|h| h.id)
    }

    pub fn neighbor(&self, id: BattleHexId, direction: u8) -> Option<BattleHexId> {
        self.at(self.hex(id).hex.neighbor(direction))
    }

    /// (direction, neighbor) pairs
    pub fn neighbors(&self, id: BattleHexId) -> impl Iterator<Item = (u8, BattleHexId)> + '_ {
        (0..6).filter_map(move |d| self.neighbor(id, d).map(|n| (d, n)))
    }

    pub fn distance(&self, a: BattleHexId, b: BattleHexId) -> u8 {
        self.hex(a).hex.distance_to(self.hex(b).hex)
    }

    /// Feature on the edge between a hex and its neighbor, whichever
    /// side it was recorded on
    pub fn edge(&self, id: BattleHexId, direction: u8) -> Hexside {
        let here = self.hex(id).hexsides[direction as usize];
        if here != Hexside::Open {
            return here;
        }
        match self.neighbor(id, direction) {
            Some(n) => self.hex(n).hexsides[opposite(direction) as usize],
            None => Hexside::Open,
        }
    }

    /// Hexes a creature can step onto from its side's entrance
    pub fn entrance(&self, side: BattleSide) -> &[BattleHexId] {
        match side {
            BattleSide::Attacker => &self.attacker_entry,
            BattleSide::Defender => &self.defender_entry,
        }
    }

    /// Steps from a side's entrance to a hex (entrance hexes are 1 away)
    pub fn distance_from_entrance(&self, side: BattleSide, id: BattleHexId) -> u8 {
        self.entrance(side)
            .iter()
            .map(|&e| self.distance(e, id) + 1)
            .min()
            .unwrap_or(u8::MAX)
    }
}

// ============================================================================
// LAYOUTS
// ============================================================================

struct Layout {
    terrain: Terrain,
    hazards: &'static [(&'static str, Hazard, u8)],
    cliffs: &'static [(&'static str, u8)],
    dunes: &'static [(&'static str, u8)],
    /// Edge feature placed where an elevated hex drops to a lower one
    rise: Hexside,
}

use Hazard::{Bog, Bramble, Drift, Plain, Sand, Tower, Tree, Volcano};

static LAYOUTS: [Layout; 11] = [
    Layout {
        terrain: Terrain::Plains,
        hazards: &[],
        cliffs: &[],
        dunes: &[],
        rise: Hexside::Slope,
    },
    Layout {
        terrain: Terrain::Brush,
        hazards: &[("B3", Bramble, 0), ("C2", Bramble, 0), ("D5", Bramble, 0), ("E3", Bramble, 0), ("F4", Bramble, 0)],
        cliffs: &[],
        dunes: &[],
        rise: Hexside::Slope,
    },
    Layout {
        terrain: Terrain::Marsh,
        hazards: &[("B4", Bog, 0), ("C2", Bog, 0), ("D5", Bog, 0), ("E2", Bog, 0), ("F3", Bog, 0)],
        cliffs: &[],
        dunes: &[],
        rise: Hexside::Slope,
    },
    Layout {
        terrain: Terrain::Desert,
        hazards: &[("C3", Sand, 0), ("D5", Sand, 0), ("E2", Sand, 0), ("E5", Sand, 0)],
        cliffs: &[],
        dunes: &[("C3", 0), ("D5", 0), ("E2", 3), ("E5", 0)],
        rise: Hexside::Slope,
    },
    Layout {
        terrain: Terrain::Tower,
        hazards: &[
            ("D4", Tower, 2),
            ("C3", Tower, 1),
            ("C4", Tower, 1),
            ("D3", Tower, 1),
            ("D5", Tower, 1),
            ("E3", Tower, 1),
            ("E4", Tower, 1),
        ],
        cliffs: &[],
        dunes: &[],
        rise: Hexside::Wall,
    },
    Layout {
        terrain: Terrain::Jungle,
        hazards: &[("B2", Bramble, 0), ("C4", Bramble, 0), ("D2", Bramble, 0), ("D4", Tree, 0), ("E5", Bramble, 0), ("F3", Bramble, 0)],
        cliffs: &[],
        dunes: &[],
        rise: Hexside::Slope,
    },
    Layout {
        terrain: Terrain::Woods,
        hazards: &[("C2", Tree, 0), ("C5", Tree, 0), ("E2", Tree, 0), ("E5", Tree, 0)],
        cliffs: &[],
        dunes: &[],
        rise: Hexside::Slope,
    },
    Layout {
        terrain: Terrain::Hills,
        hazards: &[("B2", Tree, 0), ("C3", Plain, 1), ("D4", Plain, 1), ("D5", Plain, 1), ("E4", Plain, 1), ("F3", Tree, 0)],
        cliffs: &[],
        dunes: &[],
        rise: Hexside::Slope,
    },
    Layout {
        terrain: Terrain::Swamp,
        hazards: &[("B2", Bog, 0), ("C5", Bog, 0), ("D3", Tree, 0), ("E3", Bog, 0), ("F4", Bog, 0)],
        cliffs: &[],
        dunes: &[],
        rise: Hexside::Slope,
    },
    Layout {
        terrain: Terrain::Mountains,
        hazards: &[
            ("D4", Volcano, 2),
            ("C3", Plain, 1),
            ("C4", Plain, 1),
            ("D3", Plain, 1),
            ("D5", Plain, 1),
            ("E3", Plain, 1),
            ("E4", Plain, 1),
        ],
        cliffs: &[("C4", 3), ("E3", 1)],
        dunes: &[],
        rise: Hexside::Slope,
    },
    Layout {
        terrain: Terrain::Tundra,
        hazards: &[("B3", Drift, 0), ("C5", Drift, 0), ("D2", Drift, 0), ("E4", Drift, 0), ("F2", Drift, 0)],
        cliffs: &[],
        dunes: &[],
        rise: Hexside::Slope,
    },
];

static BATTLE_MAPS: LazyLock<Vec<BattleMap>> = LazyLock::new(|| {
    Terrain::ALL
        .iter()
        .map(|&terrain| {
            let layout = LAYOUTS.iter().find(|l| l.terrain == terrain);
            build_map(terrain, layout)
        })
        .collect()
});

/// Column letter and row number for an axial position
fn label_for(hex: Hex) -> String {
    let column = (b'A' + (hex.q + BATTLE_RADIUS) as u8) as char;
    let r_min = (-BATTLE_RADIUS).max(-BATTLE_RADIUS - hex.q);
    format!("{}{}", column, hex.r - r_min + 1)
}

fn build_map(terrain: Terrain, layout: Option<&Layout>) -> BattleMap {
    let mut hexes = Vec::new();
    for q in -BATTLE_RADIUS..=BATTLE_RADIUS {
        let r_min = (-BATTLE_RADIUS).max(-BATTLE_RADIUS - q);
        let r_max = BATTLE_RADIUS.min(BATTLE_RADIUS - q);
        for r in r_min..=r_max {
            let hex = Hex::new(q, r);
            hexes.push(BattleHex {
                id: hexes.len() as BattleHexId,
                label: label_for(hex),
                hex,
                hazard: Hazard::Plain,
                elevation: 0,
                hexsides: [Hexside::Open; 6],
            });
        }
    }

    let mut map = BattleMap {
        terrain,
        hexes,
        attacker_entry: Vec::new(),
        defender_entry: Vec::new(),
    };
    map.attacker_entry = map
        .hexes
        .iter()
        .filter(|h| h.hex.q == -BATTLE_RADIUS)
        .map(|h| h.id)
        .collect();
    map.defender_entry = map
        .hexes
        .iter()
        .filter(|h| h.hex.q == BATTLE_RADIUS)
        .map(|h| h.id)
        .collect();

    let Some(layout) = layout else {
        return map;
    };

    for &(label, hazard, elevation) in layout.hazards {
        if let Some(id) = map.by_label(label) {
            let hex = &mut map.hexes[id as usize];
            hex.hazard = hazard;
            hex.elevation = elevation;
        }
    }

    // Elevated hexes get the layout's rise feature toward lower ground
    for id in 0..map.hexes.len() as BattleHexId {
        for dir in 0..6 {
            if let Some(n) = map.neighbor(id, dir) {
                if map.hex(id).elevation > map.hex(n).elevation {
                    map.hexes[id as usize].hexsides[dir as usize] = layout.rise;
                }
            }
        }
    }

    for &(label, dir) in layout.cliffs {
        if let Some(id) = map.by_label(label) {
            map.hexes[id as usize].hexsides[dir as usize] = Hexside::Cliff;
        }
    }
    for &(label, dir) in layout.dunes {
        if let Some(id) = map.by_label(label) {
            map.hexes[id as usize].hexsides[dir as usize] = Hexside::Dune;
        }
    }

    map
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_shape() {
        let map = BattleMap::for_terrain(Terrain::Plains);
        assert_eq!(map.hexes().len(), 37);
        assert_eq!(map.entrance(BattleSide::Attacker).len(), 4);
        assert_eq!(map.entrance(BattleSide::Defender).len(), 4);
        let center = map.by_label("D4").unwrap();
        assert_eq!(map.hex(center).hex, Hex::new(0, 0));
        assert_eq!(map.neighbors(center).count(), 6);
        let corner = map.by_label("A1").unwrap();
        assert_eq!(map.neighbors(corner).count(), 3);
    }

    #[test]
    fn test_labels() {
        let map = BattleMap::for_terrain(Terrain::Plains);
        for label in ["A1", "A4", "B5", "C6", "D1", "D7", "E6", "F5", "G1", "G4"] {
            assert!(map.by_label(label).is_some(), "{label}");
        }
        assert!(map.by_label("A5").is_none());
        assert!(map.by_label("H1").is_none());
    }

    #[test]
    fn test_every_layout_label_exists() {
        for layout in LAYOUTS.iter() {
            let map = BattleMap::for_terrain(layout.terrain);
            assert_eq!(map.terrain, layout.terrain);
            for (label, hazard, _) in layout.hazards {
                let id = map.by_label(label).unwrap();
                assert_eq!(map.hex(id).hazard, *hazard);
            }
        }
    }

    #[test]
    fn test_tower_walls() {
        let map = BattleMap::for_terrain(Terrain::Tower);
        let top = map.by_label("D4").unwrap();
        assert_eq!(map.hex(top).elevation, 2);
        for (dir, _) in map.neighbors(top) {
            assert_eq!(map.edge(top, dir), Hexside::Wall);
        }
        // The wall is visible from the lower side too
        let below = map.by_label("D5").unwrap();
        assert_eq!(map.edge(below, 0), Hexside::Wall);
    }

    #[test]
    fn test_mountain_cliff() {
        let map = BattleMap::for_terrain(Terrain::Mountains);
        let c4 = map.by_label("C4").unwrap();
        assert_eq!(map.edge(c4, 3), Hexside::Cliff);
        assert_eq!(map.hex(map.by_label("D4").unwrap()).hazard, Hazard::Volcano);
    }

    #[test]
    fn test_entrance_distance() {
        let map = BattleMap::for_terrain(Terrain::Plains);
        let a2 = map.by_label("A2").unwrap();
        let d4 = map.by_label("D4").unwrap();
        assert_eq!(map.distance_from_entrance(BattleSide::Attacker, a2), 1);
        assert_eq!(map.distance_from_entrance(BattleSide::Attacker, d4), 4);
        assert_eq!(map.distance_from_entrance(BattleSide::Defender, d4), 4);
    }
}
