//! Master board geometry: axial hex coordinates plus the static map of
//! labelled hexes, their terrain and their exits
//!
//! The map follows the Titan labelling (three rings, six towers) but its
//! terrain and exit layout is a compact board of its own, not the printed
//! Titan map, so move sets differ from the boxed game.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Master-board hex label (1..18, 100..601, 1000..6000)
pub type HexLabel = u16;

/// Axial hex coordinates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hex {
    pub q: i8,
    pub r: i8,
}

impl Hex {
    pub const fn new(q: i8, r: i8) -> Self {
        Self { q, r }
    }

    /// Distance between two hexes
    pub fn distance_to(&self, other: Hex) -> u8 {
        let dq = (self.q - other.q).abs();
        let dr = (self.r - other.r).abs();
        let ds = ((self.q + self.r) - (other.q + other.r)).abs();
        ((dq + dr + ds) / 2) as u8
    }

    /// Get neighbor in direction (0-5)
    pub fn neighbor(&self, direction: u8) -> Hex {
        let (dq, dr) = DIRECTIONS[direction as usize % 6];
        Hex::new(self.q + dq, self.r + dr)
    }

    /// Direction (0-5) to an adjacent hex
    pub fn direction_to(&self, other: Hex) -> Option<u8> {
        (0..6).find(|&d| self.neighbor(d) == other)
    }
}

/// Direction vectors in axial coordinates (dq, dr)
/// Index: 0=N, 1=NE, 2=SE, 3=S, 4=SW, 5=NW
pub const DIRECTIONS: [(i8, i8); 6] = [
    (0, -1),  // N
    (1, -1),  // NE
    (1, 0),   // SE
    (0, 1),   // S
    (-1, 1),  // SW
    (-1, 0),  // NW
];

/// The hexside facing back the way we came
pub fn opposite(direction: u8) -> u8 {
    (direction + 3) % 6
}

// ============================================================================
// MASTER BOARD
// ============================================================================

/// Master-board terrain
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Terrain {
    Plains,
    Brush,
    Marsh,
    Desert,
    Tower,
    Jungle,
    Woods,
    Hills,
    Swamp,
    Mountains,
    Tundra,
}

impl Terrain {
    pub const ALL: [Terrain; 11] = [
        Terrain::Plains,
        Terrain::Brush,
        Terrain::Marsh,
        Terrain::Desert,
        Terrain::Tower,
        Terrain::Jungle,
        Terrain::Woods,
        Terrain::Hills,
        Terrain::Swamp,
        Terrain::Mountains,
        Terrain::Tundra,
    ];
}

/// Exit type on a master hexside, ordered by permissiveness
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Exit {
    None,
    /// A legion starting here must leave through this side
    Block,
    /// Usable on the first step only
    Arch,
    /// Usable on any step
    Arrow,
}

/// A labelled master-board hex
#[derive(Clone, Debug)]
pub struct MasterHex {
    pub label: HexLabel,
    pub hex: Hex,
    pub terrain: Terrain,
    pub exits: [Exit; 6],
}

impl MasterHex {
    const fn new(label: HexLabel, q: i8, r: i8, terrain: Terrain, exits: [Exit; 6]) -> Self {
        Self {
            label,
            hex: Hex::new(q, r),
            terrain,
            exits,
        }
    }

    /// Neighboring master hex in a direction, if on the board
    pub fn neighbor(&self, direction: u8) -> Option<&'static MasterHex> {
        let target = self.hex.neighbor(direction);
        MASTER_BOARD.iter().find(|h| h.hex == target)
    }

    /// Direction of this hex's block exit, if it has one
    pub fn block_exit(&self) -> Option<u8> {
        self.exits
            .iter()
            .position(|&e| e == Exit::Block)
            .map(|d| d as u8)
    }

    pub fn is_tower(&self) -> bool {
        self.terrain == Terrain::Tower
    }
}

const NO: Exit = Exit::None;
const BL: Exit = Exit::Block;
const AR: Exit = Exit::Arch;
const AW: Exit = Exit::Arrow;

/// Starting towers
pub const TOWERS: [HexLabel; 6] = [100, 200, 300, 400, 500, 600];

/// The whole master board. Exits are listed by direction (N, NE, SE, S, SW, NW).
pub static MASTER_BOARD: [MasterHex; 36] = [
    MasterHex::new(1, -3, 3, Terrain::Plains, [NO, AW, AW, NO, NO, NO]),
    MasterHex::new(2, -2, 3, Terrain::Brush, [NO, NO, AW, NO, NO, NO]),
    MasterHex::new(3, -1, 3, Terrain::Marsh, [NO, NO, AW, NO, NO, NO]),
    MasterHex::new(4, 0, 3, Terrain::Woods, [AW, AW, NO, NO, NO, NO]),
    MasterHex::new(5, 1, 2, Terrain::Desert, [NO, AW, NO, NO, NO, NO]),
    MasterHex::new(6, 2, 1, Terrain::Brush, [NO, AW, NO, NO, NO, NO]),
    MasterHex::new(7, 3, 0, Terrain::Plains, [AW, NO, NO, NO, NO, AW]),
    MasterHex::new(8, 3, -1, Terrain::Marsh, [AW, NO, NO, NO, NO, NO]),
    MasterHex::new(9, 3, -2, Terrain::Hills, [AW, NO, NO, NO, NO, NO]),
    MasterHex::new(10, 3, -3, Terrain::Jungle, [NO, NO, NO, NO, AW, AW]),
    MasterHex::new(11, 2, -3, Terrain::Desert, [NO, NO, NO, NO, NO, AW]),
    MasterHex::new(12, 1, -3, Terrain::Woods, [NO, NO, NO, NO, NO, AW]),
    MasterHex::new(13, 0, -3, Terrain::Plains, [NO, NO, NO, AW, AW, NO]),
    MasterHex::new(14, -1, -2, Terrain::Swamp, [NO, NO, NO, NO, AW, NO]),
    MasterHex::new(15, -2, -1, Terrain::Brush, [NO, NO, NO, NO, AW, NO]),
    MasterHex::new(16, -3, 0, Terrain::Hills, [NO, NO, AW, AW, NO, NO]),
    MasterHex::new(17, -3, 1, Terrain::Marsh, [NO, NO, NO, AW, NO, NO]),
    MasterHex::new(18, -3, 2, Terrain::Woods, [NO, NO, NO, AW, NO, NO]),
    MasterHex::new(100, -2, 2, Terrain::Tower, [AR, NO, AR, AR, NO, NO]),
    MasterHex::new(101, -1, 2, Terrain::Jungle, [AW, NO, AW, NO, NO, AW]),
    MasterHex::new(200, 0, 2, Terrain::Tower, [NO, AR, AR, NO, NO, AR]),
    MasterHex::new(201, 1, 1, Terrain::Swamp, [NO, AW, NO, NO, AW, AW]),
    MasterHex::new(300, 2, 0, Terrain::Tower, [AR, AR, NO, NO, AR, NO]),
    MasterHex::new(301, 2, -1, Terrain::Jungle, [AW, NO, NO, AW, AW, NO]),
    MasterHex::new(400, 2, -2, Terrain::Tower, [AR, NO, NO, AR, NO, AR]),
    MasterHex::new(401, 1, -2, Terrain::Swamp, [NO, NO, AW, AW, NO, AW]),
    MasterHex::new(500, 0, -2, Terrain::Tower, [NO, NO, AR, NO, AR, AR]),
    MasterHex::new(501, -1, -1, Terrain::Jungle, [NO, AW, AW, NO, AW, NO]),
    MasterHex::new(600, -2, 0, Terrain::Tower, [NO, AR, NO, AR, AR, NO]),
    MasterHex::new(601, -2, 1, Terrain::Swamp, [AW, NO, AW, AW, NO, NO]),
    MasterHex::new(1000, -1, 1, Terrain::Mountains, [NO, NO, AW, NO, NO, BL]),
    MasterHex::new(2000, 0, 1, Terrain::Tundra, [NO, AW, BL, NO, NO, NO]),
    MasterHex::new(3000, 1, 0, Terrain::Mountains, [AW, BL, NO, NO, NO, NO]),
    MasterHex::new(4000, 1, -1, Terrain::Tundra, [BL, NO, NO, NO, NO, AW]),
    MasterHex::new(5000, 0, -1, Terrain::Mountains, [NO, NO, NO, NO, AW, BL]),
    MasterHex::new(6000, -1, 0, Terrain::Tundra, [NO, NO, NO, AW, BL, NO]),
];

/// Look up a master hex by label
pub fn master_hex(label: HexLabel) -> Option<&'static MasterHex> {
    MASTER_BOARD.iter().find(|h| h.label == label)
}

/// Terrain of a labelled hex
pub fn terrain_of(label: HexLabel) -> Option<Terrain> {
    master_hex(label).map(|h| h.terrain)
}

/// Every hex within `distance` steps by plain adjacency, exits ignored.
/// Includes the start hex.
pub fn hexes_within(label: HexLabel, distance: u8) -> FxHashSet<HexLabel> {
    let mut seen = FxHashSet::default();
    let Some(start) = master_hex(label) else {
        return seen;
    };
    seen.insert(start.label);
    let mut frontier = vec![start];
    for _ in 0..distance {
        let mut next = Vec::new();
        for hex in frontier {
            for dir in 0..6 {
                if let Some(n) = hex.neighbor(dir) {
                    if seen.insert(n.label) {
                        next.push(n);
                    }
                }
            }
        }
        frontier = next;
    }
    seen
}

// ============================================================================
// TESTS
// ============================================================================
