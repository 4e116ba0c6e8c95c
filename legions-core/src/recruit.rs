//! Recruiting chains per master terrain
//!
//! Each terrain lists one or more chains. In a chain, entry `i` can be
//! recruited by showing `count` creatures of entry `i - 1`, or by showing one
//! creature of entry `i` itself or of any higher entry. The jokers
//! `Anything` and `AnyCreature` stand in for "any legion" and "`count` of any
//! one ordinary creature type".

use crate::board::Terrain;
use crate::creature::CreatureKind;
use rustc_hash::FxHashMap;

/// A step in a recruiting chain
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recruiter {
    Creature(CreatureKind),
    /// Any legion at all
    Anything,
    /// Some number of one ordinary creature type
    AnyCreature,
}

/// Chain entry: the creature (or joker) and how many of the previous entry
/// it takes to recruit it (0 for jokers and chain heads that cannot be
/// recruited themselves)
pub type ChainEntry = (Recruiter, u8);

use Recruiter::{AnyCreature, Anything, Creature as C};

const fn c(kind: CreatureKind) -> Recruiter {
    C(kind)
}

type Chain = &'static [ChainEntry];

static PLAINS: &[Chain] = &[&[
    (c(CreatureKind::CENTAUR), 1),
    (c(CreatureKind::LION), 2),
    (c(CreatureKind::RANGER), 2),
]];
static BRUSH: &[Chain] = &[&[
    (c(CreatureKind::GARGOYLE), 1),
    (c(CreatureKind::CYCLOPS), 2),
    (c(CreatureKind::GORGON), 2),
]];
static MARSH: &[Chain] = &[&[
    (c(CreatureKind::OGRE), 1),
    (c(CreatureKind::TROLL), 2),
    (c(CreatureKind::RANGER), 2),
]];
static DESERT: &[Chain] = &[&[
    (c(CreatureKind::LION), 1),
    (c(CreatureKind::GRIFFON), 3),
    (c(CreatureKind::HYDRA), 2),
]];
static TOWER: &[Chain] = &[
    &[(Anything, 0), (c(CreatureKind::CENTAUR), 1)],
    &[(Anything, 0), (c(CreatureKind::GARGOYLE), 1)],
    &[(Anything, 0), (c(CreatureKind::OGRE), 1)],
    &[(c(CreatureKind::TITAN), 0), (c(CreatureKind::WARLOCK), 1)],
    &[(AnyCreature, 0), (c(CreatureKind::GUARDIAN), 3)],
];
static JUNGLE: &[Chain] = &[&[
    (c(CreatureKind::GARGOYLE), 1),
    (c(CreatureKind::CYCLOPS), 2),
    (c(CreatureKind::BEHEMOTH), 3),
    (c(CreatureKind::SERPENT), 2),
]];
static WOODS: &[Chain] = &[&[
    (c(CreatureKind::CENTAUR), 1),
    (c(CreatureKind::WARBEAR), 3),
    (c(CreatureKind::UNICORN), 2),
]];
static HILLS: &[Chain] = &[&[
    (c(CreatureKind::OGRE), 1),
    (c(CreatureKind::MINOTAUR), 3),
    (c(CreatureKind::UNICORN), 2),
]];
static SWAMP: &[Chain] = &[&[
    (c(CreatureKind::TROLL), 1),
    (c(CreatureKind::WYVERN), 3),
    (c(CreatureKind::HYDRA), 2),
]];
static MOUNTAINS: &[Chain] = &[&[
    (c(CreatureKind::LION), 1),
    (c(CreatureKind::MINOTAUR), 2),
    (c(CreatureKind::DRAGON), 2),
    (c(CreatureKind::COLOSSUS), 2),
]];
static TUNDRA: &[Chain] = &[&[
    (c(CreatureKind::TROLL), 1),
    (c(CreatureKind::WARBEAR), 2),
    (c(CreatureKind::GIANT), 2),
    (c(CreatureKind::COLOSSUS), 2),
]];

/// Recruiting chains for a terrain
pub fn chains(terrain: Terrain) -> &'static [Chain] {
    match terrain {
        Terrain::Plains => PLAINS,
        Terrain::Brush => BRUSH,
        Terrain::Marsh => MARSH,
        Terrain::Desert => DESERT,
        Terrain::Tower => TOWER,
        Terrain::Jungle => JUNGLE,
        Terrain::Woods => WOODS,
        Terrain::Hills => HILLS,
        Terrain::Swamp => SWAMP,
        Terrain::Mountains => MOUNTAINS,
        Terrain::Tundra => TUNDRA,
    }
}

// ============================================================================
// ELIGIBILITY
// ============================================================================

/// Creature counts of a legion, as the recruiting rules see them
pub struct Counts {
    counts: FxHashMap<CreatureKind, u8>,
}

impl Counts {
    pub fn new(creatures: impl IntoIterator<Item = CreatureKind>) -> Self {
        let mut counts = FxHashMap::default();
        for kind in creatures {
            *counts.entry(kind).or_insert(0) += 1;
        }
        Self { counts }
    }

    pub fn of(&self, kind: CreatureKind) -> u8 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// Largest number of one ordinary creature type
    pub fn max_of_one_ordinary(&self) -> u8 {
        self.counts
            .iter()
            .filter(|(kind, _)| kind.is_ordinary())
            .map(|(_, &n)| n)
            .max()
            .unwrap_or(0)
    }

    fn of_recruiter(&self, recruiter: Recruiter) -> u8 {
        match recruiter {
            Recruiter::Creature(kind) => self.of(kind),
            Recruiter::Anything | Recruiter::AnyCreature => 0,
        }
    }
}

/// Whether chain entry `ii` is unlocked by the legion's composition
fn unlocks(chain: &[ChainEntry], ii: usize, counts: &Counts) -> bool {
    let (name, num) = chain[ii];
    let prev = if ii >= 1 { Some(chain[ii - 1].0) } else { None };
    if num > 0 && counts.of_recruiter(name) > 0 {
        return true;
    }
    match prev {
        None => num == 0,
        Some(Recruiter::Anything) => true,
        Some(Recruiter::AnyCreature) => counts.max_of_one_ordinary() >= num,
        Some(prev) => counts.of_recruiter(prev) >= num,
    }
}

/// Creatures a legion with these counts could recruit in a terrain, in table
/// order, ignoring pool supply
pub fn eligible_recruits(terrain: Terrain, counts: &Counts) -> Vec<CreatureKind> {
    let mut eligible = Vec::new();
    for chain in chains(terrain) {
        if let Some(top) = (0..chain.len()).rev().find(|&ii| unlocks(chain, ii, counts)) {
            for &(recruiter, num) in &chain[..=top] {
                if let (Recruiter::Creature(kind), true) = (recruiter, num > 0) {
                    if !eligible.contains(&kind) {
                        eligible.push(kind);
                    }
                }
            }
        }
    }

    // Keep the order the creatures first appear in the table
    let mut ordered = Vec::new();
    for chain in chains(terrain) {
        for &(recruiter, _) in chain.iter() {
            if let Recruiter::Creature(kind) = recruiter {
                if eligible.contains(&kind) && !ordered.contains(&kind) {
                    ordered.push(kind);
                }
            }
        }
    }
    ordered
}

/// Every set of creatures the legion could reveal to recruit `recruit`.
/// An empty set means no reveal is needed.
pub fn recruiter_sets(terrain: Terrain, counts: &Counts, recruit: CreatureKind) -> Vec<Vec<CreatureKind>> {
    let mut sets: Vec<Vec<CreatureKind>> = Vec::new();
    let mut push = |set: Vec<CreatureKind>| {
        if !sets.contains(&set) {
            sets.push(set);
        }
    };

    for chain in chains(terrain) {
        let Some(target) = chain
            .iter()
            .position(|&(r, num)| r == Recruiter::Creature(recruit) && num > 0)
        else {
            continue;
        };
        for ii in target..chain.len() {
            let (name, num) = chain[ii];
            if num == 0 {
                continue;
            }
            // One of this entry or of a higher entry
            if let Recruiter::Creature(kind) = name {
                if counts.of(kind) > 0 {
                    push(vec![kind]);
                }
            }
            if ii == 0 {
                continue;
            }
            match chain[ii - 1].0 {
                Recruiter::Anything => push(Vec::new()),
                Recruiter::AnyCreature => {
                    let mut kinds: Vec<_> = CreatureKind::all()
                        .filter(|k| k.is_ordinary() && counts.of(*k) >= num)
                        .collect();
                    kinds.sort();
                    for kind in kinds {
                        push(vec![kind; num as usize]);
                    }
                }
                Recruiter::Creature(prev) => {
                    if counts.of(prev) >= num {
                        push(vec![prev; num as usize]);
                    }
                }
            }
        }
    }
    sets
}

// ============================================================================
// TESTS
// ============================================================================
