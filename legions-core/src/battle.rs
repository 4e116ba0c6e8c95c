//! Battles: the transient aggregate created for one engagement, plus a
//! snapshot view of both legions on the battle map with the strike math

use crate::battlemap::{BattleHexId, BattleMap, BattleSide, Hazard, Hexside};
use crate::board::{HexLabel, Terrain};
use crate::creature::{Creature, Rangestrike};
use crate::legion::Legion;
use crate::phase::BattlePhase;
use serde::{Deserialize, Serialize};

/// Battle turns before the attacker loses on time
pub const MAX_BATTLE_TURNS: u8 = 7;

/// Battle turn on which the defender may reinforce
pub const REINFORCE_TURN: u8 = 4;

/// Excess hits waiting to be carried to another target
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCarry {
    pub striker: BattleHexId,
    pub target: BattleHexId,
    pub strike_number: u8,
    pub hits: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Battle {
    pub hex: HexLabel,
    pub terrain: Terrain,
    pub attacker: String,
    pub defender: String,
    pub attacker_player: String,
    pub defender_player: String,
    pub turn: u8,
    pub phase: BattlePhase,
    pub active: BattleSide,
    /// Point value of everything that fought on each side
    pub attacker_value: u32,
    pub defender_value: u32,
    pub summoned: bool,
    pub reinforced: bool,
    pub defender_lost: bool,
    pub pending_carry: Option<PendingCarry>,
}

impl Battle {
    pub fn new(hex: HexLabel, terrain: Terrain, attacker: &Legion, defender: &Legion) -> Self {
        Self {
            hex,
            terrain,
            attacker: attacker.marker.clone(),
            defender: defender.marker.clone(),
            attacker_player: attacker.owner.clone(),
            defender_player: defender.owner.clone(),
            turn: 1,
            phase: BattlePhase::Reinforce,
            active: BattleSide::Defender,
            attacker_value: attacker.score(),
            defender_value: defender.score(),
            summoned: false,
            reinforced: false,
            defender_lost: false,
            pending_carry: None,
        }
    }

    pub fn map(&self) -> &'static BattleMap {
        BattleMap::for_terrain(self.terrain)
    }

    pub fn marker(&self, side: BattleSide) -> &str {
        match side {
            BattleSide::Attacker => &self.attacker,
            BattleSide::Defender => &self.defender,
        }
    }

    pub fn player(&self, side: BattleSide) -> &str {
        match side {
            BattleSide::Attacker => &self.attacker_player,
            BattleSide::Defender => &self.defender_player,
        }
    }

    pub fn side_of(&self, marker: &str) -> Option<BattleSide> {
        if marker == self.attacker {
            Some(BattleSide::Attacker)
        } else if marker == self.defender {
            Some(BattleSide::Defender)
        } else {
            None
        }
    }

    pub fn value_mut(&mut self, side: BattleSide) -> &mut u32 {
        match side {
            BattleSide::Attacker => &mut self.attacker_value,
            BattleSide::Defender => &mut self.defender_value,
        }
    }

    /// Side whose creatures strike in the current phase
    pub fn striking_side(&self) -> BattleSide {
        match self.phase {
            BattlePhase::Counterstrike => self.active.other(),
            _ => self.active,
        }
    }
}

// ============================================================================
// BATTLE FIELD
// ============================================================================

/// A creature on the battle map, tagged with its side and its index in
/// the legion
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fighter {
    pub side: BattleSide,
    pub slot: usize,
    pub creature: Creature,
}

/// Snapshot of both legions on the map. Cheap to clone for hypotheticals.
#[derive(Clone, Debug)]
pub struct BattleField {
    pub map: &'static BattleMap,
    pub fighters: Vec<Fighter>,
    pub active: BattleSide,
    pub phase: BattlePhase,
    pub turn: u8,
}

impl BattleField {
    pub fn new(battle: &Battle, attacker: &Legion, defender: &Legion) -> Self {
        let tag = |side: BattleSide, legion: &Legion| {
            legion
                .creatures
                .iter()
                .enumerate()
                .map(move |(slot, creature)| Fighter {
                    side,
                    slot,
                    creature: creature.clone(),
                })
                .collect::<Vec<_>>()
        };
        let mut fighters = tag(BattleSide::Attacker, attacker);
        fighters.extend(tag(BattleSide::Defender, defender));
        Self {
            map: battle.map(),
            fighters,
            active: battle.active,
            phase: battle.phase,
            turn: battle.turn,
        }
    }

    pub fn side(&self, side: BattleSide) -> impl Iterator<Item = usize> + '_ {
        (0..self.fighters.len()).filter(move |&i| self.fighters[i].side == side)
    }

    pub fn find(&self, side: BattleSide, slot: usize) -> Option<usize> {
        self.fighters.iter().position(|f| f.side == side && f.slot == slot)
    }

    /// Fighter standing on a hex
    pub fn occupant(&self, hex: BattleHexId) -> Option<usize> {
        self.fighters.iter().position(|f| f.creature.hex == Some(hex))
    }

    /// Whether a living enemy of `side` stands next to `hex`, not across a cliff
    pub fn enemy_adjacent(&self, hex: BattleHexId, side: BattleSide) -> bool {
        !self.enemies_next_to(hex, side).is_empty()
    }

    fn enemies_next_to(&self, hex: BattleHexId, side: BattleSide) -> Vec<usize> {
        self.map
            .neighbors(hex)
            .filter(|&(dir, _)| self.map.edge(hex, dir) != Hexside::Cliff)
            .filter_map(|(_, n)| self.occupant(n))
            .filter(|&i| self.fighters[i].side != side && !self.fighters[i].creature.is_dead())
            .collect()
    }

    /// Living enemies engaged with a fighter
    pub fn engaged_enemies(&self, fighter: usize) -> Vec<usize> {
        let me = &self.fighters[fighter];
        match me.creature.hex {
            Some(hex) => self.enemies_next_to(hex, me.side),
            None => Vec::new(),
        }
    }

    pub fn is_engaged(&self, fighter: usize) -> bool {
        !self.engaged_enemies(fighter).is_empty()
    }

    fn elevation(&self, fighter: usize) -> u8 {
        self.fighters[fighter]
            .creature
            .hex
            .map(|h| self.map.hex(h).elevation)
            .unwrap_or(0)
    }

    fn hazard(&self, fighter: usize) -> Hazard {
        self.fighters[fighter]
            .creature
            .hex
            .map(|h| self.map.hex(h).hazard)
            .unwrap_or(Hazard::Plain)
    }

    pub fn number_of_dice(&self, striker: usize, target: usize, rangestrike: bool) -> u8 {
        let creature = &self.fighters[striker].creature;
        if rangestrike {
            return (creature.power / 2).max(1);
        }
        let mut dice = creature.power;
        if self.hazard(striker) == Hazard::Volcano && creature.is_native(Hazard::Volcano) {
            dice += 2;
        }
        if self.elevation(striker) > self.elevation(target) {
            dice += 1;
        }
        dice
    }

    pub fn strike_number(&self, striker: usize, target: usize) -> u8 {
        let attacker = &self.fighters[striker].creature;
        let defender = &self.fighters[target].creature;
        let mut number = 6 - (attacker.skill() as i8 - defender.skill() as i8);
        if self.hazard(target) == Hazard::Bramble && !attacker.is_native(Hazard::Bramble) {
            number += 1;
        }
        if self.elevation(target) > self.elevation(striker) {
            number += 1;
        }
        number.clamp(2, 6) as u8
    }

    /// Enemies a fighter can rangestrike this phase
    pub fn rangestrike_targets(&self, fighter: usize) -> Vec<usize> {
        let me = &self.fighters[fighter];
        let kind = me.creature.kind.data().rangestrike;
        if kind == Rangestrike::None || self.phase != BattlePhase::Strike || self.is_engaged(fighter) {
            return Vec::new();
        }
        let Some(from) = me.creature.hex else {
            return Vec::new();
        };
        let skill = me.creature.skill();
        self.side(me.side.other())
            .filter(|&i| {
                let target = &self.fighters[i].creature;
                let Some(to) = target.hex else {
                    return false;
                };
                let distance = self.map.distance(from, to);
                !target.is_dead()
                    && (2..=skill).contains(&distance)
                    && (!target.is_lord() || kind == Rangestrike::MagicMissile)
            })
            .collect()
    }

    /// Legal strike targets: engaged enemies, else rangestrike targets
    pub fn strike_targets(&self, fighter: usize) -> Vec<usize> {
        let engaged = self.engaged_enemies(fighter);
        if !engaged.is_empty() {
            return engaged;
        }
        self.rangestrike_targets(fighter)
    }

    /// Other engaged enemies that excess hits from a strike on `target`
    /// at `strike_number` may carry to
    pub fn carry_targets(&self, striker: usize, target: usize, strike_number: u8) -> Vec<usize> {
        self.engaged_enemies(striker)
            .into_iter()
            .filter(|&i| i != target && self.strike_number(striker, i) <= strike_number)
            .collect()
    }

    /// Fighters of `side` that still owe a strike
    pub fn must_strike(&self, side: BattleSide) -> Vec<usize> {
        self.side(side)
            .filter(|&i| !self.fighters[i].creature.struck && self.is_engaged(i))
            .collect()
    }

    /// Fighters of `side` that could strike at anything
    pub fn can_strike(&self, side: BattleSide) -> Vec<usize> {
        self.side(side)
            .filter(|&i| !self.fighters[i].creature.struck && !self.strike_targets(i).is_empty())
            .collect()
    }

    /// Move a fighter on this snapshot only
    pub fn place(&mut self, fighter: usize, hex: Option<BattleHexId>) {
        let creature = &mut self.fighters[fighter].creature;
        creature.previous_hex = creature.hex;
        creature.hex = hex;
        creature.moved = true;
    }
}

/// Average hits from a strike
pub fn expected_hits(dice: u8, strike_number: u8) -> f64 {
    dice as f64 * (7.0 - strike_number as f64) / 6.0
}

// ============================================================================
// TESTS
// ============================================================================
