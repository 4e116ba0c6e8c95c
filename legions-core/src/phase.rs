//! Master and battle phase enums

use serde::{Deserialize, Serialize};
use std::fmt;

/// Master-board phase of the active player's turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    Split,
    Move,
    Fight,
    Muster,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Split => "split",
            Phase::Move => "move",
            Phase::Fight => "fight",
            Phase::Muster => "muster",
        };
        f.write_str(name)
    }
}

/// Phase within one side's half of a battle turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BattlePhase {
    Reinforce,
    Maneuver,
    Strike,
    DriftDamage,
    Counterstrike,
    Cleanup,
}

impl BattlePhase {
    /// The phase that follows, wrapping from Cleanup back to Reinforce
    pub fn next(self) -> Self {
        match self {
            BattlePhase::Reinforce => BattlePhase::Maneuver,
            BattlePhase::Maneuver => BattlePhase::Strike,
            BattlePhase::Strike => BattlePhase::DriftDamage,
            BattlePhase::DriftDamage => BattlePhase::Counterstrike,
            BattlePhase::Counterstrike => BattlePhase::Cleanup,
            BattlePhase::Cleanup => BattlePhase::Reinforce,
        }
    }
}

impl fmt::Display for BattlePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battle_phase_cycle() {
        let mut phase = BattlePhase::Reinforce;
        let mut seen = vec![phase];
        for _ in 0..5 {
            phase = phase.next();
            seen.push(phase);
        }
        assert_eq!(seen.last(), Some(&BattlePhase::Cleanup));
        assert_eq!(phase.next(), BattlePhase::Reinforce);
        assert!(Phase::Split < Phase::Muster);
    }
}
