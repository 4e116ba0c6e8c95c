//! Notifications: one record per state change
//!
//! Every successful command produces a list of actions. Applying the same
//! actions, in order, through `Game::update` reproduces the change on any
//! mirror, so actions carry every die roll and every derived choice.

use crate::battlemap::{BattleHexId, BattleSide};
use crate::board::HexLabel;
use crate::creature::CreatureKind;
use crate::movement::EntrySide;
use crate::phase::BattlePhase;
use crate::player::Color;
use serde::{Deserialize, Serialize};

/// Starting position of one player
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub player: String,
    pub tower: HexLabel,
    pub color: Color,
    pub marker: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Seats in turn order
    GameStarted {
        seats: Vec<Seat>,
    },
    StartSplitPhase {
        player: String,
        turn: u32,
    },
    SplitLegion {
        player: String,
        parent: String,
        child: String,
        parent_creatures: Vec<CreatureKind>,
        child_creatures: Vec<CreatureKind>,
    },
    UndoSplit {
        player: String,
        parent: String,
        child: String,
        parent_creatures: Vec<CreatureKind>,
        child_creatures: Vec<CreatureKind>,
    },
    DoneSplitting {
        player: String,
    },
    RollMovement {
        player: String,
        roll: u8,
        mulligan: bool,
    },
    MoveLegion {
        player: String,
        marker: String,
        previous_hex: HexLabel,
        hex: HexLabel,
        entry_side: EntrySide,
        teleport: bool,
        teleporting_lord: Option<CreatureKind>,
    },
    UndoMoveLegion {
        player: String,
        marker: String,
        previous_hex: HexLabel,
        hex: HexLabel,
        entry_side: EntrySide,
        teleport: bool,
        teleporting_lord: Option<CreatureKind>,
    },
    /// Two legions stuck in one hex become one; creatures beyond the height
    /// limit go back to the pool
    MergeLegions {
        player: String,
        survivor: String,
        absorbed: String,
        returned: Vec<CreatureKind>,
    },
    DoneMoving {
        player: String,
    },
    ResolvingEngagement {
        hex: HexLabel,
        attacker: String,
        defender: String,
    },
    Flee {
        player: String,
        marker: String,
    },
    DoNotFlee {
        player: String,
        marker: String,
    },
    Concede {
        player: String,
        marker: String,
    },
    StartBattle {
        hex: HexLabel,
        attacker: String,
        defender: String,
    },
    BattlePhaseStarted {
        turn: u8,
        side: BattleSide,
        phase: BattlePhase,
    },
    SummonAngel {
        player: String,
        marker: String,
        donor: String,
        creature: CreatureKind,
    },
    DoNotSummonAngel {
        player: String,
        marker: String,
    },
    MoveCreature {
        marker: String,
        slot: usize,
        from: Option<BattleHexId>,
        to: BattleHexId,
    },
    UndoMoveCreature {
        marker: String,
        slot: usize,
        from: Option<BattleHexId>,
        to: BattleHexId,
    },
    /// Creatures that never left the entrance die
    KillOffboard {
        marker: String,
        slots: Vec<usize>,
    },
    Strike {
        striker: BattleHexId,
        target: BattleHexId,
        dice: u8,
        strike_number: u8,
        rolls: Vec<u8>,
        hits: u8,
        rangestrike: bool,
        /// Excess hits available to carry
        carries: u8,
    },
    Carry {
        target: BattleHexId,
        hits: u8,
        carries_left: u8,
    },
    DriftDamage {
        hexes: Vec<BattleHexId>,
    },
    RemoveDeadCreatures {
        dead: Vec<(String, CreatureKind)>,
    },
    /// Ends the engagement; losing legions are removed afterwards
    BattleOver {
        hex: HexLabel,
        winner: Option<String>,
        losers: Vec<String>,
        time_loss: bool,
    },
    ScorePoints {
        player: String,
        points: u32,
    },
    AcquisitionOffered {
        player: String,
        marker: String,
        angels: u8,
        archangels: u8,
    },
    AcquireAngels {
        player: String,
        marker: String,
        angels: Vec<CreatureKind>,
    },
    DoNotAcquireAngels {
        player: String,
        marker: String,
    },
    RemoveLegion {
        player: String,
        marker: String,
        /// Dead creatures go to the graveyard, others back to the bank
        to_graveyard: bool,
    },
    CaptureMarkers {
        player: String,
        from: String,
    },
    /// Players dying in one resolution step, each with its slayer
    EliminatePlayers {
        deaths: Vec<(String, Option<String>)>,
    },
    GameOver {
        winner: Option<String>,
    },
    DoneFighting {
        player: String,
    },
    RecruitCreature {
        player: String,
        marker: String,
        creature: CreatureKind,
        recruiters: Vec<CreatureKind>,
    },
    UndoRecruit {
        player: String,
        marker: String,
        creature: CreatureKind,
        recruiters: Vec<CreatureKind>,
    },
    DoneRecruiting {
        player: String,
    },
}

impl Action {
    /// The action that reverses this one, for undoable kinds
    pub fn undo_action(&self) -> Option<Action> {
        match self.clone() {
            Action::SplitLegion {
                player,
                parent,
                child,
                parent_creatures,
                child_creatures,
            } => Some(Action::UndoSplit {
                player,
                parent,
                child,
                parent_creatures,
                child_creatures,
            }),
            Action::MoveLegion {
                player,
                marker,
                previous_hex,
                hex,
                entry_side,
                teleport,
                teleporting_lord,
            } => Some(Action::UndoMoveLegion {
                player,
                marker,
                previous_hex,
                hex,
                entry_side,
                teleport,
                teleporting_lord,
            }),
            Action::RecruitCreature {
                player,
                marker,
                creature,
                recruiters,
            } => Some(Action::UndoRecruit {
                player,
                marker,
                creature,
                recruiters,
            }),
            Action::MoveCreature { marker, slot, from, to } => Some(Action::UndoMoveCreature { marker, slot, from, to }),
            _ => None,
        }
    }

    pub fn is_undo(&self) -> bool {
        matches!(
            self,
            Action::UndoSplit { .. }
                | Action::UndoMoveLegion { .. }
                | Action::UndoRecruit { .. }
                | Action::UndoMoveCreature { .. }
        )
    }
}

/// Anything that keeps a view of a game in sync from its notifications
pub trait Observer {
    fn update(&mut self, action: &Action);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undo_pairs() {
        let split = Action::SplitLegion {
            player: "p0".into(),
            parent: "Rd01".into(),
            child: "Rd02".into(),
            parent_creatures: vec![CreatureKind::TITAN],
            child_creatures: vec![CreatureKind::ANGEL],
        };
        let undo = split.undo_action().unwrap();
        assert!(undo.is_undo());
        assert!(matches!(undo, Action::UndoSplit { ref child, .. } if child == "Rd02"));

        let roll = Action::RollMovement {
            player: "p0".into(),
            roll: 3,
            mulligan: false,
        };
        assert_eq!(roll.undo_action(), None);
        assert!(!roll.is_undo());
    }

    #[test]
    fn test_tagged_json() {
        let action = Action::ScorePoints {
            player: "p1".into(),
            points: 42,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["action"], "score_points");
        let back: Action = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);
    }
}
