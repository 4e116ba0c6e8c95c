//! Move legality engine
//!
//! Master-board moves (normal walks and teleports) and battle-board moves.
//! The rules engine and the bot both go through these functions, so a move
//! the bot proposes is always one the game will accept.

use crate::battle::BattleField;
use crate::battlemap::{BattleHexId, Hazard, Hexside};
use crate::board::{hexes_within, master_hex, opposite, Exit, HexLabel, TOWERS};
use crate::creature::CreatureKind;
use crate::error::{illegal_move, Result};
use crate::legion::Legion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Hexside a legion entered its hex through, or the teleport marker
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntrySide {
    Side(u8),
    Teleport,
}

/// Destination hex and entry side
pub type MasterMove = (HexLabel, EntrySide);

/// Movement facts about the moving player
#[derive(Clone, Copy, Debug)]
pub struct MoveContext {
    pub roll: u8,
    /// The player already teleported this turn
    pub teleported: bool,
    /// The player's score allows titan teleport
    pub titan_teleport: bool,
}

/// A requested master-board move
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveRequest {
    pub hex: HexLabel,
    pub entry_side: EntrySide,
    pub teleport: bool,
    pub teleporting_lord: Option<CreatureKind>,
}

/// Roll needed for a teleport
pub const TELEPORT_ROLL: u8 = 6;

// ============================================================================
// NORMAL MOVES
// ============================================================================

#[derive(Clone, Copy)]
enum Allowed {
    /// Forced through one hexside
    Block(u8),
    ArchesAndArrows,
    ArrowsOnly,
}

/// Every (hex, entry side) a legion can reach by walking exactly `roll`
/// hexes, given all legions on the board (the mover included or not)
pub fn find_normal_moves(legion: &Legion, board: &[&Legion], roll: u8) -> BTreeSet<MasterMove> {
    let mut moves = BTreeSet::new();
    if roll == 0 {
        return moves;
    }
    walk(legion, board, legion.hex, roll, None, None, &mut moves);
    moves
}

fn walk(
    legion: &Legion,
    board: &[&Legion],
    hex: HexLabel,
    roll: u8,
    allowed: Option<Allowed>,
    came_from: Option<u8>,
    moves: &mut BTreeSet<MasterMove>,
) {
    let others: Vec<&Legion> = board
        .iter()
        .copied()
        .filter(|l| l.hex == hex && l.marker != legion.marker)
        .collect();
    let enemies = others.iter().filter(|l| l.owner != legion.owner).count();
    let friends: Vec<&Legion> = others.into_iter().filter(|l| l.owner == legion.owner).collect();

    if let Some(side) = came_from {
        if enemies > 0 {
            if friends.is_empty() {
                moves.insert((hex, EntrySide::Side(side)));
            }
            return;
        }
    }
    if roll == 0 {
        if let Some(side) = came_from {
            if friends.len() < 2 && !friends.iter().any(|f| f.moved) {
                moves.insert((hex, EntrySide::Side(side)));
            }
        }
        return;
    }

    let Some(here) = master_hex(hex) else {
        return;
    };
    let allowed = allowed.unwrap_or_else(|| match here.block_exit() {
        Some(dir) => Allowed::Block(dir),
        None => Allowed::ArchesAndArrows,
    });
    let step = |dir: u8, moves: &mut BTreeSet<MasterMove>| {
        if let Some(next) = here.neighbor(dir) {
            walk(legion, board, next.label, roll - 1, Some(Allowed::ArrowsOnly), Some(opposite(dir)), moves);
        }
    };
    match allowed {
        Allowed::Block(dir) => step(dir, moves),
        Allowed::ArchesAndArrows | Allowed::ArrowsOnly => {
            let needed = if matches!(allowed, Allowed::ArchesAndArrows) {
                Exit::Arch
            } else {
                Exit::Arrow
            };
            for dir in 0..6u8 {
                if here.exits[dir as usize] >= needed && Some(dir) != came_from {
                    step(dir, moves);
                }
            }
        }
    }
}

// ============================================================================
// TELEPORT
// ============================================================================

/// Entry sides allowed when teleporting into a hex
pub fn teleport_entry_sides(hex: HexLabel) -> &'static [u8] {
    match master_hex(hex) {
        Some(h) if h.is_tower() => &[5],
        _ => &[1, 3, 5],
    }
}

fn tower_teleport_targets(legion: &Legion, board: &[&Legion]) -> BTreeSet<HexLabel> {
    let mut targets = BTreeSet::new();
    let in_tower = master_hex(legion.hex).is_some_and(|h| h.is_tower());
    if !in_tower || legion.num_lords() == 0 {
        return targets;
    }
    let occupied = |hex: HexLabel| board.iter().any(|l| l.hex == hex && l.marker != legion.marker);
    for hex in hexes_within(legion.hex, 6).into_iter().chain(TOWERS) {
        if hex != legion.hex && !occupied(hex) {
            targets.insert(hex);
        }
    }
    targets
}

fn titan_teleport_targets(legion: &Legion, board: &[&Legion], ctx: MoveContext) -> BTreeSet<HexLabel> {
    if !ctx.titan_teleport || !legion.has_titan() {
        return BTreeSet::new();
    }
    board
        .iter()
        .filter(|l| l.owner != legion.owner)
        .map(|l| l.hex)
        .collect()
}

/// Teleport destinations, each tagged with the teleport entry side
pub fn find_teleport_moves(legion: &Legion, board: &[&Legion], ctx: MoveContext) -> BTreeSet<MasterMove> {
    if ctx.roll != TELEPORT_ROLL || ctx.teleported {
        return BTreeSet::new();
    }
    tower_teleport_targets(legion, board)
        .into_iter()
        .chain(titan_teleport_targets(legion, board, ctx))
        .map(|hex| (hex, EntrySide::Teleport))
        .collect()
}

/// Normal and teleport moves together
pub fn find_all_moves(legion: &Legion, board: &[&Legion], ctx: MoveContext) -> BTreeSet<MasterMove> {
    let mut moves = find_normal_moves(legion, board, ctx.roll);
    moves.extend(find_teleport_moves(legion, board, ctx));
    moves
}

/// Check a requested master move against the legal set
pub fn can_move_legion(legion: &Legion, board: &[&Legion], ctx: MoveContext, request: MoveRequest) -> Result<()> {
    if legion.moved {
        return illegal_move(format!("{} already moved", legion.marker));
    }

    if !request.teleport {
        if request.teleporting_lord.is_some() {
            return illegal_move("teleporting lord given for a normal move");
        }
        let EntrySide::Side(_) = request.entry_side else {
            return illegal_move("teleport entry side given for a normal move");
        };
        if !find_normal_moves(legion, board, ctx.roll).contains(&(request.hex, request.entry_side)) {
            return illegal_move(format!(
                "{} cannot reach {} entering from {:?} with a roll of {}",
                legion.marker, request.hex, request.entry_side, ctx.roll
            ));
        }
        return Ok(());
    }

    if !find_teleport_moves(legion, board, ctx).contains(&(request.hex, EntrySide::Teleport)) {
        return illegal_move(format!("{} cannot teleport to {}", legion.marker, request.hex));
    }
    if let EntrySide::Side(side) = request.entry_side {
        if !teleport_entry_sides(request.hex).contains(&side) {
            return illegal_move(format!("cannot teleport into {} from side {}", request.hex, side));
        }
    }
    let Some(lord) = request.teleporting_lord else {
        return illegal_move("teleport needs a teleporting lord");
    };
    if !lord.is_lord() || !legion.contains(lord) {
        return illegal_move(format!("{} has no {} to teleport", legion.marker, lord));
    }
    let enemy_hex = board.iter().any(|l| l.hex == request.hex && l.owner != legion.owner);
    if enemy_hex && !lord.is_titan() {
        return illegal_move("only the titan can teleport onto an enemy");
    }
    if !enemy_hex && !tower_teleport_targets(legion, board).contains(&request.hex) {
        return illegal_move(format!("{} is not a tower teleport destination", request.hex));
    }
    Ok(())
}

// ============================================================================
// BATTLE MOVES
// ============================================================================

/// Hexes a fighter may move to this maneuver phase. With
/// `ignore_mobile_allies`, allies that can still move do not block.
pub fn find_battle_moves(field: &BattleField, fighter: usize, ignore_mobile_allies: bool) -> BTreeSet<BattleHexId> {
    let mut moves = BTreeSet::new();
    let me = &field.fighters[fighter];
    if me.creature.moved || me.creature.is_dead() || field.is_engaged(fighter) {
        return moves;
    }
    let map = field.map;
    let skill = me.creature.skill();

    let blocked = |hex: BattleHexId| -> bool {
        match field.occupant(hex) {
            Some(other) if other == fighter => false,
            Some(other) => {
                let ally = &field.fighters[other];
                let mobile = ally.side == me.side && !ally.creature.moved && !field.is_engaged(other);
                !(ignore_mobile_allies && mobile)
            }
            None => false,
        }
    };
    let enterable = |hex: BattleHexId| -> bool {
        match map.hex(hex).hazard {
            Hazard::Tree => false,
            hazard @ (Hazard::Bog | Hazard::Volcano) => me.creature.is_native(hazard),
            _ => true,
        }
    };

    if me.creature.flies() {
        for hex in map.hexes() {
            let distance = match me.creature.hex {
                Some(from) => map.distance(from, hex.id),
                None => map.distance_from_entrance(me.side, hex.id),
            };
            if Some(hex.id) != me.creature.hex && distance <= skill && enterable(hex.id) && !blocked(hex.id) {
                moves.insert(hex.id);
            }
        }
        return moves;
    }

    // Best remaining allowance seen per hex
    let mut best = vec![None::<u8>; map.hexes().len()];
    let mut stack: Vec<(BattleHexId, u8)> = Vec::new();
    let enter = |hex: BattleHexId, crossing: Option<(BattleHexId, u8)>, left: u8| -> Option<u8> {
        if !enterable(hex) || blocked(hex) {
            return None;
        }
        let mut left = left;
        if let Some((from, dir)) = crossing {
            let feature = map.edge(from, dir);
            let upward = map.hex(hex).elevation > map.hex(from).elevation;
            match feature {
                Hexside::Cliff => return None,
                Hexside::Slope | Hexside::Wall if upward && !me.creature.is_native_hexside(feature) => left = 0,
                Hexside::Dune if !me.creature.is_native_hexside(feature) => left = 0,
                _ => {}
            }
        }
        let hazard = map.hex(hex).hazard;
        if matches!(hazard, Hazard::Bramble | Hazard::Sand | Hazard::Drift) && !me.creature.is_native(hazard) {
            left = 0;
        }
        if field.enemy_adjacent(hex, me.side) {
            left = 0;
        }
        Some(left)
    };

    match me.creature.hex {
        Some(start) => stack.push((start, skill)),
        None => {
            for &hex in map.entrance(me.side) {
                if let Some(left) = enter(hex, None, skill.saturating_sub(1)) {
                    stack.push((hex, left));
                    best[hex as usize] = Some(left);
                    moves.insert(hex);
                }
            }
        }
    }

    while let Some((hex, left)) = stack.pop() {
        if left == 0 {
            continue;
        }
        for (dir, next) in map.neighbors(hex) {
            if Some(next) == me.creature.hex {
                continue;
            }
            let Some(remaining) = enter(next, Some((hex, dir)), left - 1) else {
                continue;
            };
            if best[next as usize].is_some_and(|seen| seen >= remaining) {
                continue;
            }
            best[next as usize] = Some(remaining);
            moves.insert(next);
            stack.push((next, remaining));
        }
    }
    moves
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creature::Creature;
    use crate::legion::STARTING_CREATURES;

    fn legion(marker: &str, owner: &str, hex: HexLabel, kinds: &[CreatureKind]) -> Legion {
        Legion::new(marker, owner, hex, kinds.iter().map(|&k| Creature::new(k)).collect())
    }

    fn small(marker: &str, owner: &str, hex: HexLabel) -> Legion {
        legion(
            marker,
            owner,
            hex,
            &[CreatureKind::TITAN, CreatureKind::GARGOYLE, CreatureKind::CENTAUR, CreatureKind::CENTAUR],
        )
    }

    fn side(s: u8) -> EntrySide {
        EntrySide::Side(s)
    }

    fn set(moves: &[(HexLabel, u8)]) -> BTreeSet<MasterMove> {
        moves.iter().map(|&(h, s)| (h, side(s))).collect()
    }

    fn ctx(roll: u8) -> MoveContext {
        MoveContext {
            roll,
            teleported: false,
            titan_teleport: false,
        }
    }

    #[test]
    fn test_normal_moves_from_tower() {
        let mover = small("Rd01", "p0", 100);
        let enemy = small("Bu01", "p1", 400);
        let board = [&mover, &enemy];
        let expected: [&[(HexLabel, u8)]; 6] = [
            &[(2, 0), (101, 5), (601, 3)],
            &[(3, 5), (200, 5), (600, 3), (1000, 3), (1000, 5)],
            &[(4, 5), (2000, 5)],
            &[(5, 4), (200, 3), (3000, 4)],
            &[(6, 4), (4000, 3)],
            &[(7, 4), (5000, 2)],
        ];
        for (i, moves) in expected.iter().enumerate() {
            let roll = i as u8 + 1;
            assert_eq!(find_normal_moves(&mover, &board, roll), set(moves), "roll {roll}");
        }
    }

    #[test]
    fn test_teleport_from_tower() {
        let mover = small("Rd01", "p0", 100);
        let enemy = small("Bu01", "p1", 400);
        let board = [&mover, &enemy];
        let teleports = find_teleport_moves(&mover, &board, ctx(6));
        assert_eq!(teleports.len(), 34);
        assert!(teleports.iter().all(|(_, s)| *s == EntrySide::Teleport));
        assert!(!teleports.contains(&(400, EntrySide::Teleport)));
        assert!(!teleports.contains(&(100, EntrySide::Teleport)));

        let all = find_all_moves(&mover, &board, ctx(6));
        assert!(all.is_superset(&find_normal_moves(&mover, &board, 6)));
        assert!(all.is_superset(&teleports));

        assert!(find_teleport_moves(&mover, &board, ctx(5)).is_empty());
        let spent = MoveContext { teleported: true, ..ctx(6) };
        assert!(find_teleport_moves(&mover, &board, spent).is_empty());
    }

    #[test]
    fn test_titan_teleport() {
        let mover = small("Rd01", "p0", 7);
        let enemy = small("Bu01", "p1", 400);
        let board = [&mover, &enemy];
        assert!(find_teleport_moves(&mover, &board, ctx(6)).is_empty());
        let rich = MoveContext { titan_teleport: true, ..ctx(6) };
        let moves = find_teleport_moves(&mover, &board, rich);
        assert_eq!(moves, [(400, EntrySide::Teleport)].into_iter().collect());
    }

    #[test]
    fn test_enemy_stops_walk() {
        let mover = small("Rd01", "p0", 100);
        let enemy = small("Bu01", "p1", 101);
        let board = [&mover, &enemy];
        let moves = find_normal_moves(&mover, &board, 2);
        // 101 is the only way to 200 on a two, and the enemy stops us there
        assert!(!moves.contains(&(200, side(5))));
        assert!(moves.contains(&(101, side(5))));
        let one = find_normal_moves(&mover, &board, 1);
        assert!(one.contains(&(101, side(5))));
    }

    #[test]
    fn test_friendly_stack_limits() {
        let mover = small("Rd01", "p0", 100);
        let mut friend = small("Rd02", "p0", 2);
        let board = [&mover, &friend];
        assert!(find_normal_moves(&mover, &board, 1).contains(&(2, side(0))));
        friend.moved = true;
        let board = [&mover, &friend];
        assert!(!find_normal_moves(&mover, &board, 1).contains(&(2, side(0))));

        let a = small("Rd02", "p0", 2);
        let b = small("Rd03", "p0", 2);
        let board = [&mover, &a, &b];
        assert!(!find_normal_moves(&mover, &board, 1).contains(&(2, side(0))));
    }

    #[test]
    fn test_can_move_legion_rejections() {
        let mover = small("Rd01", "p0", 100);
        let enemy = small("Bu01", "p1", 400);
        let board = [&mover, &enemy];

        let normal = MoveRequest {
            hex: 7,
            entry_side: side(4),
            teleport: false,
            teleporting_lord: None,
        };
        assert!(can_move_legion(&mover, &board, ctx(6), normal).is_ok());

        // Reachable only by teleport
        let sneaky = MoveRequest { hex: 300, entry_side: side(5), ..normal };
        assert!(can_move_legion(&mover, &board, ctx(6), sneaky).is_err());
        let teleport = MoveRequest {
            hex: 300,
            entry_side: side(5),
            teleport: true,
            teleporting_lord: Some(CreatureKind::TITAN),
        };
        assert!(can_move_legion(&mover, &board, ctx(6), teleport).is_ok());

        // Lord not in the legion
        let wrong_lord = MoveRequest { teleporting_lord: Some(CreatureKind::ANGEL), ..teleport };
        assert!(can_move_legion(&mover, &board, ctx(6), wrong_lord).is_err());
        // Not a lord at all
        let not_lord = MoveRequest { teleporting_lord: Some(CreatureKind::CENTAUR), ..teleport };
        assert!(can_move_legion(&mover, &board, ctx(6), not_lord).is_err());
        // Lord claimed on a normal move
        let lord_walk = MoveRequest { teleporting_lord: Some(CreatureKind::TITAN), ..normal };
        assert!(can_move_legion(&mover, &board, ctx(6), lord_walk).is_err());
        // Wrong entry side into a tower
        let bad_side = MoveRequest { entry_side: side(1), ..teleport };
        assert!(can_move_legion(&mover, &board, ctx(6), bad_side).is_err());
        // Wrong entry side on a normal move
        let bad_normal = MoveRequest { entry_side: side(3), ..normal };
        assert!(can_move_legion(&mover, &board, ctx(6), bad_normal).is_err());
    }

    #[test]
    fn test_starting_legion_moves() {
        let mover = legion("Rd01", "p0", 100, &STARTING_CREATURES);
        let board = [&mover];
        assert_eq!(find_normal_moves(&mover, &board, 1).len(), 3);
        assert!(find_normal_moves(&mover, &board, 0).is_empty());
    }
}
