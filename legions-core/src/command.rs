//! The command surface: every verb a client or bot can send to a game

use crate::board::HexLabel;
use crate::creature::CreatureKind;
use crate::movement::EntrySide;
use serde::{Deserialize, Serialize};

/// A request against a game. The sending player travels alongside it.
/// Battle hexes are given by label ("D4"); `from: None` means the entrance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verb", rename_all = "snake_case")]
pub enum Command {
    // Split phase
    SplitLegion {
        parent: String,
        child: String,
        keep: Vec<CreatureKind>,
        split: Vec<CreatureKind>,
    },
    UndoSplit {
        parent: String,
        child: String,
    },
    DoneWithSplits,

    // Move phase
    TakeMulligan,
    MoveLegion {
        marker: String,
        hex: HexLabel,
        entry_side: EntrySide,
        #[serde(default)]
        teleport: bool,
        #[serde(default)]
        teleporting_lord: Option<CreatureKind>,
    },
    UndoMoveLegion {
        marker: String,
    },
    DoneWithMoves,

    // Fight phase
    ResolveEngagement {
        hex: HexLabel,
    },
    Flee {
        marker: String,
    },
    DoNotFlee {
        marker: String,
    },
    Concede {
        marker: String,
    },
    Fight {
        attacker: String,
        defender: String,
    },
    DoneWithEngagements,

    // Muster phase, and battle reinforcement
    RecruitCreature {
        marker: String,
        creature: CreatureKind,
        #[serde(default)]
        recruiters: Vec<CreatureKind>,
    },
    UndoRecruit {
        marker: String,
    },
    DoneWithRecruits,

    // Bonuses
    SummonAngel {
        marker: String,
        donor: String,
        creature: CreatureKind,
    },
    DoNotSummonAngel {
        marker: String,
    },
    AcquireAngels {
        marker: String,
        angels: Vec<CreatureKind>,
    },
    DoNotAcquireAngels {
        marker: String,
    },

    // Battle
    DoneWithReinforcements,
    MoveCreature {
        creature: CreatureKind,
        from: Option<String>,
        to: String,
    },
    UndoMoveCreature {
        creature: CreatureKind,
        hex: String,
    },
    DoneWithManeuvers,
    Strike {
        striker: String,
        target: String,
    },
    Carry {
        target: String,
    },
    DoneWithStrikes,
    DoneWithCounterstrikes,
}

impl Command {
    /// Wire name of the verb
    pub fn verb(&self) -> &'static str {
        match self {
            Command::SplitLegion { .. } => "split_legion",
            Command::UndoSplit { .. } => "undo_split",
            Command::DoneWithSplits => "done_with_splits",
            Command::TakeMulligan => "take_mulligan",
            Command::MoveLegion { .. } => "move_legion",
            Command::UndoMoveLegion { .. } => "undo_move_legion",
            Command::DoneWithMoves => "done_with_moves",
            Command::ResolveEngagement { .. } => "resolve_engagement",
            Command::Flee { .. } => "flee",
            Command::DoNotFlee { .. } => "do_not_flee",
            Command::Concede { .. } => "concede",
            Command::Fight { .. } => "fight",
            Command::DoneWithEngagements => "done_with_engagements",
            Command::RecruitCreature { .. } => "recruit_creature",
            Command::UndoRecruit { .. } => "undo_recruit",
            Command::DoneWithRecruits => "done_with_recruits",
            Command::SummonAngel { .. } => "summon_angel",
            Command::DoNotSummonAngel { .. } => "do_not_summon_angel",
            Command::AcquireAngels { .. } => "acquire_angels",
            Command::DoNotAcquireAngels { .. } => "do_not_acquire_angels",
            Command::DoneWithReinforcements => "done_with_reinforcements",
            Command::MoveCreature { .. } => "move_creature",
            Command::UndoMoveCreature { .. } => "undo_move_creature",
            Command::DoneWithManeuvers => "done_with_maneuvers",
            Command::Strike { .. } => "strike",
            Command::Carry { .. } => "carry",
            Command::DoneWithStrikes => "done_with_strikes",
            Command::DoneWithCounterstrikes => "done_with_counterstrikes",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let command = Command::MoveLegion {
            marker: "Rd01".into(),
            hex: 101,
            entry_side: EntrySide::Side(5),
            teleport: false,
            teleporting_lord: None,
        };
        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(json["verb"], "move_legion");
        assert_eq!(json["hex"], 101);
        assert_eq!(command.verb(), "move_legion");

        let parsed: Command = serde_json::from_str(
            r#"{"verb":"recruit_creature","marker":"Rd02","creature":"Lion","recruiters":["Centaur","Centaur"]}"#,
        )
        .unwrap();
        assert_eq!(
            parsed,
            Command::RecruitCreature {
                marker: "Rd02".into(),
                creature: CreatureKind::LION,
                recruiters: vec![CreatureKind::CENTAUR, CreatureKind::CENTAUR],
            }
        );

        let done: Command = serde_json::from_str(r#"{"verb":"done_with_splits"}"#).unwrap();
        assert_eq!(done, Command::DoneWithSplits);
    }
}
