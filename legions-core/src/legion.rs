//! Legions: stacks of creatures under one marker

use crate::board::{terrain_of, HexLabel};
use crate::creature::{Creature, CreatureKind};
use crate::error::{invariant, Result};
use crate::movement::EntrySide;
use crate::pool::CreaturePool;
use crate::recruit::{eligible_recruits, recruiter_sets, Counts};
use serde::{Deserialize, Serialize};

/// Maximum legion height outside the initial split
pub const MAX_HEIGHT: usize = 7;

/// Starting legion contents
pub const STARTING_CREATURES: [CreatureKind; 8] = [
    CreatureKind::TITAN,
    CreatureKind::ANGEL,
    CreatureKind::CENTAUR,
    CreatureKind::CENTAUR,
    CreatureKind::GARGOYLE,
    CreatureKind::GARGOYLE,
    CreatureKind::OGRE,
    CreatureKind::OGRE,
];

/// A recruit made this turn, kept so a retransmitted recruit can be
/// recognized
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecruitRecord {
    pub creature: CreatureKind,
    pub recruiters: Vec<CreatureKind>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Legion {
    pub marker: String,
    pub owner: String,
    pub hex: HexLabel,
    /// Formation order matters for battle entry
    pub creatures: Vec<Creature>,
    pub moved: bool,
    pub teleported: bool,
    pub teleporting_lord: Option<CreatureKind>,
    pub entry_side: Option<EntrySide>,
    pub previous_hex: Option<HexLabel>,
    pub recruited: Option<RecruitRecord>,
}

impl Legion {
    pub fn new(marker: &str, owner: &str, hex: HexLabel, creatures: Vec<Creature>) -> Self {
        Self {
            marker: marker.to_string(),
            owner: owner.to_string(),
            hex,
            creatures,
            moved: false,
            teleported: false,
            teleporting_lord: None,
            entry_side: None,
            previous_hex: None,
            recruited: None,
        }
    }

    pub fn height(&self) -> usize {
        self.creatures.len()
    }

    pub fn kinds(&self) -> Vec<CreatureKind> {
        self.creatures.iter().map(|c| c.kind).collect()
    }

    /// Creature names in alphabetical order
    pub fn creature_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.creatures.iter().map(|c| c.name()).collect();
        names.sort_unstable();
        names
    }

    pub fn contains(&self, kind: CreatureKind) -> bool {
        self.creatures.iter().any(|c| c.kind == kind)
    }

    pub fn has_titan(&self) -> bool {
        self.contains(CreatureKind::TITAN)
    }

    pub fn num_lords(&self) -> usize {
        self.creatures.iter().filter(|c| c.is_lord()).count()
    }

    /// Distinct lord types in the legion
    pub fn lords(&self) -> Vec<CreatureKind> {
        let mut lords: Vec<_> = self.creatures.iter().filter(|c| c.is_lord()).map(|c| c.kind).collect();
        lords.sort();
        lords.dedup();
        lords
    }

    pub fn first_lord(&self) -> Option<CreatureKind> {
        self.creatures.iter().find(|c| c.is_lord()).map(|c| c.kind)
    }

    /// Only lordless legions may flee
    pub fn can_flee(&self) -> bool {
        self.num_lords() == 0
    }

    /// On turn 1 only the starting 8-high legion splits; afterwards any
    /// legion of 4 or more
    pub fn can_be_split(&self, turn: u32) -> bool {
        if turn == 1 {
            self.height() == 8
        } else {
            self.height() >= 4
        }
    }

    /// Whether the two child lists are a legal partition of this legion
    pub fn is_legal_split(&self, child1: &[CreatureKind], child2: &[CreatureKind]) -> bool {
        if self.height() < 4 || self.height() != child1.len() + child2.len() {
            return false;
        }
        let mut whole = self.kinds();
        let mut parts: Vec<_> = child1.iter().chain(child2).copied().collect();
        whole.sort();
        parts.sort();
        if whole != parts {
            return false;
        }
        if self.height() == 8 {
            let lords = |c: &[CreatureKind]| c.iter().filter(|k| k.is_lord()).count();
            if child1.len() != 4 || child2.len() != 4 || lords(child1) != 1 || lords(child2) != 1 {
                return false;
            }
        }
        true
    }

    pub fn add_creature(&mut self, creature: Creature) -> Result<()> {
        if self.height() >= MAX_HEIGHT {
            return invariant(format!("{} is already {} high", self.marker, self.height()));
        }
        self.creatures.push(creature);
        Ok(())
    }

    /// Remove the first creature of a kind
    pub fn remove_creature(&mut self, kind: CreatureKind) -> Result<Creature> {
        match self.creatures.iter().position(|c| c.kind == kind) {
            Some(i) => Ok(self.creatures.remove(i)),
            None => invariant(format!("{} has no {}", self.marker, kind)),
        }
    }

    pub fn move_to(
        &mut self,
        hex: HexLabel,
        teleport: bool,
        entry_side: EntrySide,
        teleporting_lord: Option<CreatureKind>,
    ) {
        self.moved = true;
        self.previous_hex = Some(self.hex);
        self.hex = hex;
        self.teleported = teleport;
        self.teleporting_lord = teleporting_lord;
        self.entry_side = Some(entry_side);
    }

    pub fn undo_move(&mut self) {
        if !self.moved {
            return;
        }
        if let Some(previous) = self.previous_hex.take() {
            self.hex = previous;
        }
        self.moved = false;
        self.teleported = false;
        self.teleporting_lord = None;
        self.entry_side = None;
    }

    /// Clear per-turn flags
    pub fn reset_turn(&mut self) {
        self.moved = false;
        self.teleported = false;
        self.teleporting_lord = None;
        self.entry_side = None;
        self.previous_hex = None;
        self.recruited = None;
    }

    /// Point value of the whole legion
    pub fn score(&self) -> u32 {
        self.creatures.iter().map(|c| c.score()).sum()
    }

    /// Point value of creatures still alive
    pub fn living_score(&self) -> u32 {
        self.living().map(|c| c.score()).sum()
    }

    pub fn living(&self) -> impl Iterator<Item = &Creature> {
        self.creatures.iter().filter(|c| !c.is_dead())
    }

    pub fn living_height(&self) -> usize {
        self.living().count()
    }

    pub fn combat_value(&self) -> f64 {
        self.living().map(|c| c.combat_value()).sum()
    }

    /// Creatures from strongest to weakest
    pub fn sorted_creatures(&self) -> Vec<&Creature> {
        let mut sorted: Vec<_> = self.creatures.iter().collect();
        sorted.sort_by(|a, b| b.sort_value().total_cmp(&a.sort_value()));
        sorted
    }

    fn counts(&self) -> Counts {
        Counts::new(self.living().map(|c| c.kind))
    }

    /// What this legion could recruit in its current hex given pool supply
    pub fn available_recruits(&self, pool: &CreaturePool) -> Vec<CreatureKind> {
        let Some(terrain) = terrain_of(self.hex) else {
            return Vec::new();
        };
        eligible_recruits(terrain, &self.counts())
            .into_iter()
            .filter(|&kind| pool.num_left(kind) > 0)
            .collect()
    }

    /// Legal sets of creatures to reveal for a recruit
    pub fn recruiter_sets(&self, recruit: CreatureKind) -> Vec<Vec<CreatureKind>> {
        match terrain_of(self.hex) {
            Some(terrain) => recruiter_sets(terrain, &self.counts(), recruit),
            None => Vec::new(),
        }
    }

    /// A moved legion below full height that has not recruited this turn
    pub fn can_recruit(&self, pool: &CreaturePool) -> bool {
        self.moved
            && self.height() < MAX_HEIGHT
            && self.recruited.is_none()
            && !self.available_recruits(pool).is_empty()
    }

    /// Angels and Archangels in the legion, for summoning
    pub fn summonables(&self) -> Vec<CreatureKind> {
        let mut kinds: Vec<_> = self
            .creatures
            .iter()
            .filter(|c| c.kind.data().summonable)
            .map(|c| c.kind)
            .collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    /// Update titan power after the owner's score changes
    pub fn set_titan_power(&mut self, power: u8) {
        for creature in self.creatures.iter_mut().filter(|c| c.is_titan()) {
            creature.power = power;
        }
    }

    pub fn reset_battle_state(&mut self) {
        for creature in &mut self.creatures {
            creature.reset_battle_state();
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
