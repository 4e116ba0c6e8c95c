//! Master-board verbs: setup, split, move and muster

use super::{Game, MIN_PLAYERS};
use crate::action::{Action, Seat};
use crate::board::{HexLabel, TOWERS};
use crate::creature::CreatureKind;
use crate::error::{illegal_move, illegal_recruit, invariant, out_of_turn, GameError, Result};
use crate::legion::{Legion, MAX_HEIGHT};
use crate::movement::{can_move_legion, find_all_moves, find_normal_moves, EntrySide, MoveRequest};
use crate::phase::Phase;
use crate::player::Color;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;

impl Game {
    /// Draw towers, seat players in tower order and hand out the starting
    /// legions
    pub fn start(&mut self) -> Result<Vec<Action>> {
        if self.started {
            return out_of_turn(format!("{} already started", self.name));
        }
        if self.players.len() < MIN_PLAYERS {
            return invariant(format!("{} needs at least {} players", self.name, MIN_PLAYERS));
        }

        let mut towers = TOWERS.to_vec();
        towers.shuffle(self.rng());
        let mut draw: Vec<(HexLabel, String)> = towers
            .into_iter()
            .zip(self.players.iter().map(|p| p.name.clone()))
            .collect();
        draw.sort_unstable();

        let seats = draw
            .into_iter()
            .zip(Color::ALL)
            .map(|((tower, player), color)| Seat {
                player,
                tower,
                color,
                marker: format!("{}01", color.abbrev()),
            })
            .collect::<Vec<_>>();
        let first = seats[0].player.clone();

        let mut out = Vec::new();
        self.emit(&mut out, Action::GameStarted { seats })?;
        self.emit(&mut out, Action::StartSplitPhase { player: first, turn: 1 })?;
        Ok(out)
    }

    // ========================================================================
    // SPLIT
    // ========================================================================

    pub(crate) fn split_legion(
        &mut self,
        player: &str,
        parent: &str,
        child: &str,
        keep: Vec<CreatureKind>,
        split: Vec<CreatureKind>,
        out: &mut Vec<Action>,
    ) -> Result<()> {
        self.require_phase(player, Phase::Split)?;
        let legion = self.owned_legion(player, parent)?;
        if !legion.can_be_split(self.turn) {
            return invariant(format!("{} cannot be split on turn {}", parent, self.turn));
        }
        let holds_marker = self.player(player).is_some_and(|p| p.markers.contains(child));
        if !holds_marker {
            return invariant(format!("{player} does not hold marker {child}"));
        }
        if keep.is_empty() || split.is_empty() || !legion.is_legal_split(&keep, &split) {
            return invariant(format!("{:?} / {:?} is not a legal split of {}", keep, split, parent));
        }
        self.emit(
            out,
            Action::SplitLegion {
                player: player.to_string(),
                parent: parent.to_string(),
                child: child.to_string(),
                parent_creatures: keep,
                child_creatures: split,
            },
        )
    }

    pub(crate) fn undo_split(&mut self, player: &str, parent: &str, child: &str, out: &mut Vec<Action>) -> Result<()> {
        self.require_phase(player, Phase::Split)?;
        let source = self.owned_legion(player, parent)?;
        let split = self.owned_legion(player, child)?;
        if source.hex != split.hex {
            return invariant(format!("{parent} and {child} are not in the same hex"));
        }
        let limit = if self.turn == 1 { MAX_HEIGHT + 1 } else { MAX_HEIGHT };
        if source.height() + split.height() > limit {
            return invariant(format!("{parent} and {child} together exceed {limit} creatures"));
        }
        let action = Action::UndoSplit {
            player: player.to_string(),
            parent: parent.to_string(),
            child: child.to_string(),
            parent_creatures: source.kinds(),
            child_creatures: split.kinds(),
        };
        self.emit(out, action)
    }

    pub(crate) fn done_with_splits(&mut self, player: &str, out: &mut Vec<Action>) -> Result<()> {
        if self.already_done(player, Phase::Split) {
            return Ok(());
        }
        self.require_phase(player, Phase::Split)?;
        if let Some(tall) = self.legions().into_iter().find(|l| l.owner == player && l.height() > MAX_HEIGHT) {
            return invariant(format!("{} must split before moving", tall.marker));
        }
        self.emit(out, Action::DoneSplitting { player: player.to_string() })?;
        let roll = self.roll_die();
        self.emit(
            out,
            Action::RollMovement {
                player: player.to_string(),
                roll,
                mulligan: false,
            },
        )
    }

    // ========================================================================
    // MOVE
    // ========================================================================

    pub(crate) fn take_mulligan(&mut self, player: &str, out: &mut Vec<Action>) -> Result<()> {
        self.require_phase(player, Phase::Move)?;
        let Some(p) = self.player(player) else {
            return out_of_turn(format!("{player} is not in this game"));
        };
        if self.turn != 1 || !self.config.mulligans || p.mulligans_left == 0 {
            return out_of_turn(format!("{player} has no mulligan available"));
        }
        if p.moved_legions() > 0 {
            return out_of_turn("cannot take a mulligan after moving");
        }
        let roll = self.roll_die();
        tracing::debug!("{} {} takes a mulligan", self.name, player);
        self.emit(
            out,
            Action::RollMovement {
                player: player.to_string(),
                roll,
                mulligan: true,
            },
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn move_legion(
        &mut self,
        player: &str,
        marker: &str,
        hex: HexLabel,
        entry_side: EntrySide,
        teleport: bool,
        teleporting_lord: Option<CreatureKind>,
        out: &mut Vec<Action>,
    ) -> Result<()> {
        self.require_phase(player, Phase::Move)?;
        let legion = self.owned_legion(player, marker)?;
        let Some(owner) = self.player(player) else {
            return out_of_turn(format!("{player} is not in this game"));
        };
        let ctx = self.move_context(owner);
        let board = self.legions();
        let request = MoveRequest {
            hex,
            entry_side,
            teleport,
            teleporting_lord,
        };
        can_move_legion(legion, &board, ctx, request)?;
        let action = Action::MoveLegion {
            player: player.to_string(),
            marker: marker.to_string(),
            previous_hex: legion.hex,
            hex,
            entry_side,
            teleport,
            teleporting_lord,
        };
        self.emit(out, action)
    }

    pub(crate) fn undo_move_legion(&mut self, player: &str, marker: &str, out: &mut Vec<Action>) -> Result<()> {
        self.require_phase(player, Phase::Move)?;
        let legion = self.owned_legion(player, marker)?;
        let (Some(previous_hex), Some(entry_side), true) = (legion.previous_hex, legion.entry_side, legion.moved) else {
            return invariant(format!("{marker} has not moved"));
        };
        let action = Action::UndoMoveLegion {
            player: player.to_string(),
            marker: marker.to_string(),
            previous_hex,
            hex: legion.hex,
            entry_side,
            teleport: legion.teleported,
            teleporting_lord: legion.teleporting_lord,
        };
        self.emit(out, action)
    }

    pub(crate) fn done_with_moves(&mut self, player: &str, out: &mut Vec<Action>) -> Result<()> {
        if self.already_done(player, Phase::Move) {
            return Ok(());
        }
        self.require_phase(player, Phase::Move)?;
        let Some(owner) = self.player(player) else {
            return out_of_turn(format!("{player} is not in this game"));
        };
        let ctx = self.move_context(owner);
        let board = self.legions();

        if owner.moved_legions() == 0 {
            if let Some(mobile) = owner
                .legions
                .values()
                .find(|l| !find_all_moves(l, &board, ctx).is_empty())
            {
                return illegal_move(format!("{} must move at least one legion, {} can", player, mobile.marker));
            }
        }

        let mut stacks: BTreeMap<HexLabel, Vec<&Legion>> = BTreeMap::new();
        for legion in owner.legions.values() {
            stacks.entry(legion.hex).or_default().push(legion);
        }
        let mut merges = Vec::new();
        for (hex, stack) in stacks.into_iter().filter(|(_, s)| s.len() > 1) {
            let stuck = stack
                .iter()
                .filter(|l| !l.moved)
                .all(|l| find_normal_moves(l, &board, ctx.roll).is_empty());
            if !stuck {
                return illegal_move(format!("split legions in {hex} must be separated"));
            }
            merges.push(merge_plan(player, &stack));
        }

        for merge in merges {
            self.emit(out, merge)?;
        }
        self.emit(out, Action::DoneMoving { player: player.to_string() })
    }

    // ========================================================================
    // MUSTER
    // ========================================================================

    pub(crate) fn recruit_creature(
        &mut self,
        player: &str,
        marker: &str,
        creature: CreatureKind,
        recruiters: Vec<CreatureKind>,
        out: &mut Vec<Action>,
    ) -> Result<()> {
        if self.battle.as_ref().is_some_and(|b| b.defender == marker) {
            return self.reinforce(player, marker, creature, recruiters, out);
        }
        self.require_phase(player, Phase::Muster)?;
        let legion = self.owned_legion(player, marker)?;
        if let Some(done) = &legion.recruited {
            if done.creature == creature {
                return Ok(());
            }
            return illegal_recruit(format!("{} already recruited a {} this turn", marker, done.creature));
        }
        if !legion.moved {
            return illegal_recruit(format!("{marker} did not move this turn"));
        }
        if legion.height() >= MAX_HEIGHT {
            return invariant(format!("{marker} is already {MAX_HEIGHT} high"));
        }
        let recruiters = self.check_recruit(legion, creature, recruiters)?;
        self.emit(
            out,
            Action::RecruitCreature {
                player: player.to_string(),
                marker: marker.to_string(),
                creature,
                recruiters,
            },
        )
    }

    /// Check a recruit against terrain, composition and pool supply and
    /// return the recruiters to reveal
    pub(crate) fn check_recruit(
        &self,
        legion: &Legion,
        creature: CreatureKind,
        mut recruiters: Vec<CreatureKind>,
    ) -> Result<Vec<CreatureKind>> {
        if !legion.available_recruits(&self.pool).contains(&creature) {
            return illegal_recruit(format!("{} cannot recruit a {} in {}", legion.marker, creature, legion.hex));
        }
        let sets = legion.recruiter_sets(creature);
        if sets.is_empty() || sets.iter().any(|s| s.is_empty()) {
            return Ok(Vec::new());
        }
        if recruiters.is_empty() {
            return Ok(sets[0].clone());
        }
        recruiters.sort();
        if !sets.contains(&recruiters) {
            return illegal_recruit(format!("{:?} cannot recruit a {}", recruiters, creature));
        }
        Ok(recruiters)
    }

    pub(crate) fn undo_recruit(&mut self, player: &str, marker: &str, out: &mut Vec<Action>) -> Result<()> {
        self.require_phase(player, Phase::Muster)?;
        let legion = self.owned_legion(player, marker)?;
        let Some(done) = legion.recruited.clone() else {
            return invariant(format!("{marker} has not recruited"));
        };
        self.emit(
            out,
            Action::UndoRecruit {
                player: player.to_string(),
                marker: marker.to_string(),
                creature: done.creature,
                recruiters: done.recruiters,
            },
        )
    }

    pub(crate) fn done_with_recruits(&mut self, player: &str, out: &mut Vec<Action>) -> Result<()> {
        if self.already_done(player, Phase::Muster) {
            return Ok(());
        }
        self.require_phase(player, Phase::Muster)?;
        let (next, turn) = self
            .next_player_and_turn()
            .ok_or_else(|| GameError::InvariantViolation("no living player".into()))?;
        self.emit(out, Action::DoneRecruiting { player: player.to_string() })?;
        tracing::debug!("{} {} done with turn {}", self.name, player, self.turn);
        self.emit(out, Action::StartSplitPhase { player: next, turn })
    }
}

/// Merge a stuck stack into its titan legion (or its first legion),
/// returning the weakest creatures beyond the height limit to the pool
fn merge_plan(player: &str, stack: &[&Legion]) -> Action {
    let survivor = stack.iter().find(|l| l.has_titan()).unwrap_or(&stack[0]);
    let absorbed = stack.iter().find(|l| l.marker != survivor.marker).unwrap_or(&stack[0]);

    let mut combined: Vec<_> = survivor.creatures.iter().chain(&absorbed.creatures).collect();
    combined.sort_by(|a, b| b.sort_value().total_cmp(&a.sort_value()));
    let returned = combined.iter().skip(MAX_HEIGHT).map(|c| c.kind).collect();

    Action::MergeLegions {
        player: player.to_string(),
        survivor: survivor.marker.clone(),
        absorbed: absorbed.marker.clone(),
        returned,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::super::tests::two_player_game;
    use super::*;
    use crate::command::Command;
    use crate::creature::CreatureKind as K;

    fn first_legion(game: &Game, player: &str) -> String {
        game.player(player).unwrap().legions.keys().next().unwrap().clone()
    }

    fn split_command(game: &Game, player: &str) -> Command {
        let parent = first_legion(game, player);
        let child = game.player(player).unwrap().markers.iter().next().unwrap().clone();
        Command::SplitLegion {
            parent,
            child,
            keep: vec![K::TITAN, K::CENTAUR, K::CENTAUR, K::GARGOYLE],
            split: vec![K::ANGEL, K::GARGOYLE, K::OGRE, K::OGRE],
        }
    }

    #[test]
    fn test_split_and_undo() {
        let mut game = two_player_game(5);
        let p0 = game.players[0].name.clone();
        let parent = first_legion(&game, &p0);
        let command = split_command(&game, &p0);
        let Command::SplitLegion { ref child, .. } = command else {
            unreachable!()
        };
        let child = child.clone();
        let actions = game.execute(&p0, command).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(game.legion(&parent).unwrap().height(), 4);
        assert_eq!(game.legion(&child).unwrap().height(), 4);
        assert!(!game.player(&p0).unwrap().markers.contains(&child));

        game.execute(
            &p0,
            Command::UndoSplit {
                parent: parent.clone(),
                child: child.clone(),
            },
        )
        .unwrap();
        assert_eq!(game.legion(&parent).unwrap().height(), 8);
        assert!(game.legion(&child).is_none());
        assert!(game.player(&p0).unwrap().markers.contains(&child));
    }

    #[test]
    fn test_must_split_before_moving() {
        let mut game = two_player_game(5);
        let p0 = game.players[0].name.clone();
        let err = game.execute(&p0, Command::DoneWithSplits).unwrap_err();
        assert!(matches!(err, GameError::InvariantViolation(_)));
        assert_eq!(game.phase, Phase::Split);
    }

    #[test]
    fn test_illegal_split_rejected() {
        let mut game = two_player_game(5);
        let p0 = game.players[0].name.clone();
        let parent = first_legion(&game, &p0);
        let before = game.history.len();
        let err = game
            .execute(
                &p0,
                Command::SplitLegion {
                    parent,
                    child: "Zz01".into(),
                    keep: vec![K::TITAN, K::CENTAUR, K::CENTAUR, K::GARGOYLE],
                    split: vec![K::ANGEL, K::GARGOYLE, K::OGRE, K::OGRE],
                },
            )
            .unwrap_err();
        assert!(matches!(err, GameError::InvariantViolation(_)));
        assert_eq!(game.history.len(), before);
    }

    #[test]
    fn test_done_with_splits_rolls_once() {
        let mut game = two_player_game(5);
        let p0 = game.players[0].name.clone();
        game.execute(&p0, split_command(&game, &p0)).unwrap();
        let actions = game.execute(&p0, Command::DoneWithSplits).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(game.phase, Phase::Move);
        let roll = game.player(&p0).unwrap().movement_roll;
        assert!((1..=6).contains(&roll));

        // Retransmitted
        assert!(game.execute(&p0, Command::DoneWithSplits).unwrap().is_empty());
        assert_eq!(game.player(&p0).unwrap().movement_roll, roll);
    }

    #[test]
    fn test_mulligan_once() {
        let mut game = two_player_game(5);
        let p0 = game.players[0].name.clone();
        game.execute(&p0, split_command(&game, &p0)).unwrap();
        game.execute(&p0, Command::DoneWithSplits).unwrap();
        game.execute(&p0, Command::TakeMulligan).unwrap();
        assert_eq!(game.player(&p0).unwrap().mulligans_left, 0);
        assert!(game.execute(&p0, Command::TakeMulligan).is_err());
    }

    #[test]
    fn test_done_with_moves_needs_a_move() {
        let mut game = two_player_game(5);
        let p0 = game.players[0].name.clone();
        game.execute(&p0, split_command(&game, &p0)).unwrap();
        game.execute(&p0, Command::DoneWithSplits).unwrap();
        game.set_movement_roll(&p0, 1).unwrap();

        // Nothing moved yet
        let err = game.execute(&p0, Command::DoneWithMoves).unwrap_err();
        assert!(matches!(err, GameError::IllegalMove(_)));

        let parent = first_legion(&game, &p0);
        let legion = game.legion(&parent).unwrap().clone();
        let board = game.legions().into_iter().cloned().collect::<Vec<_>>();
        let refs: Vec<&Legion> = board.iter().collect();
        let (hex, side) = *find_normal_moves(&legion, &refs, 1).iter().next().unwrap();
        game.execute(
            &p0,
            Command::MoveLegion {
                marker: parent.clone(),
                hex,
                entry_side: side,
                teleport: false,
                teleporting_lord: None,
            },
        )
        .unwrap();
        game.execute(&p0, Command::DoneWithMoves).unwrap();
        assert_eq!(game.phase, Phase::Fight);
    }

    #[test]
    fn test_undo_move() {
        let mut game = two_player_game(5);
        let p0 = game.players[0].name.clone();
        game.execute(&p0, split_command(&game, &p0)).unwrap();
        game.execute(&p0, Command::DoneWithSplits).unwrap();
        game.set_movement_roll(&p0, 2).unwrap();
        let parent = first_legion(&game, &p0);
        let start = game.legion(&parent).unwrap().hex;
        let legion = game.legion(&parent).unwrap().clone();
        let refs = game.legions();
        let (hex, side) = *find_normal_moves(&legion, &refs, 2).iter().next().unwrap();
        game.execute(
            &p0,
            Command::MoveLegion {
                marker: parent.clone(),
                hex,
                entry_side: side,
                teleport: false,
                teleporting_lord: None,
            },
        )
        .unwrap();
        assert!(game.execute(
            &p0,
            Command::MoveLegion {
                marker: parent.clone(),
                hex,
                entry_side: side,
                teleport: false,
                teleporting_lord: None,
            },
        )
        .is_err());
        game.execute(&p0, Command::UndoMoveLegion { marker: parent.clone() })
            .unwrap();
        let legion = game.legion(&parent).unwrap();
        assert_eq!(legion.hex, start);
        assert!(!legion.moved);
    }

    #[test]
    fn test_merge_plan_keeps_strongest() {
        use crate::creature::Creature;
        let a = Legion::new(
            "Rd01",
            "p0",
            1,
            [K::TITAN, K::OGRE, K::OGRE, K::CENTAUR]
                .iter()
                .map(|&k| Creature::new(k))
                .collect(),
        );
        let b = Legion::new(
            "Rd02",
            "p0",
            1,
            [K::GARGOYLE, K::GARGOYLE, K::OGRE, K::TROLL]
                .iter()
                .map(|&k| Creature::new(k))
                .collect(),
        );
        let Action::MergeLegions {
            survivor,
            absorbed,
            returned,
            ..
        } = merge_plan("p0", &[&b, &a])
        else {
            panic!("expected a merge");
        };
        assert_eq!(survivor, "Rd01");
        assert_eq!(absorbed, "Rd02");
        assert_eq!(returned, vec![K::OGRE]);
    }
}
