//! Master-board decisions: splits, legion moves, engagements, musters and
//! the angel bonuses
//!
//! These are fixed-rule evaluations over the current game snapshot. Each
//! function returns the next command to send; phase-advance verbs come back
//! once nothing is left to do.

use crate::weights::ScoringWeights;
use legions_core::movement::teleport_entry_sides;
use legions_core::{
    find_all_moves, Acquisition, Battle, Command, CreatureKind, CreaturePool, Engagement, EntrySide, Game, HexLabel,
    Legion, MasterMove, MoveContext, Player, MAX_HEIGHT, REINFORCE_TURN,
};
use rand::seq::{IteratorRandom, SliceRandom};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::cmp::Ordering;

/// Ordinary creatures of the starting legion
const STARTING_ORDINARIES: [CreatureKind; 3] = [CreatureKind::CENTAUR, CreatureKind::GARGOYLE, CreatureKind::OGRE];

/// Every possible movement roll
const ROLLS: std::ops::RangeInclusive<u8> = 1..=6;

// ============================================================================
// SHARED HELPERS
// ============================================================================

fn by_sort_value(a: &CreatureKind, b: &CreatureKind) -> Ordering {
    a.sort_value().total_cmp(&b.sort_value())
}

/// Best creature the legion could recruit where it stands
pub fn best_recruit(legion: &Legion, pool: &CreaturePool) -> Option<CreatureKind> {
    legion.available_recruits(pool).into_iter().max_by(by_sort_value)
}

/// Best creature the legion could recruit if it stood in `hex`
fn best_recruit_at(legion: &Legion, hex: HexLabel, pool: &CreaturePool) -> Option<CreatureKind> {
    let mut there = legion.clone();
    there.hex = hex;
    best_recruit(&there, pool)
}

/// The enemy legion standing in a hex, if any
fn enemy_in<'a>(game: &'a Game, owner: &str, hex: HexLabel) -> Option<&'a Legion> {
    game.legions_in(hex).into_iter().find(|l| l.owner != owner)
}

// ============================================================================
// SPLIT
// ============================================================================

/// Next split for the active player, or `DoneWithSplits`
pub fn choose_split(game: &Game, player: &Player, weights: &ScoringWeights, rng: &mut ChaCha8Rng) -> Command {
    for legion in player.legions.values() {
        let Some(child) = player.markers.iter().choose(rng).cloned() else {
            break;
        };
        if !legion.can_be_split(game.turn) {
            continue;
        }
        let split = if legion.height() == MAX_HEIGHT + 1 {
            Some(opening_split(legion, rng))
        } else if legion.height() == MAX_HEIGHT {
            split_off_weakest(game, player, legion, weights)
        } else {
            None
        };
        if let Some((keep, split)) = split {
            tracing::debug!("{} splits {:?} off {}", player.name, split, legion.marker);
            return Command::SplitLegion {
                parent: legion.marker.clone(),
                child,
                keep,
                split,
            };
        }
    }
    Command::DoneWithSplits
}

/// 4/4 with one lord each: the child gets a random lord, a pair of one
/// ordinary type and one of another
fn opening_split(legion: &Legion, rng: &mut ChaCha8Rng) -> (Vec<CreatureKind>, Vec<CreatureKind>) {
    let lords = legion.lords();
    let lord = lords.choose(rng).copied().unwrap_or(CreatureKind::TITAN);
    let pair = STARTING_ORDINARIES[rng.gen_range(0..STARTING_ORDINARIES.len())];
    let others: Vec<CreatureKind> = STARTING_ORDINARIES.iter().copied().filter(|&k| k != pair).collect();
    let single = others.choose(rng).copied().unwrap_or(pair);

    let mut keep = legion.kinds();
    let mut split = Vec::with_capacity(4);
    for kind in [lord, pair, pair, single] {
        if let Some(at) = keep.iter().position(|&k| k == kind) {
            split.push(keep.remove(at));
        }
    }
    // Anything missing from the usual recipe comes from the weakest
    // remaining ordinaries
    while split.len() < 4 {
        let weakest = keep
            .iter()
            .enumerate()
            .filter(|(_, k)| !k.is_lord())
            .min_by(|a, b| by_sort_value(a.1, b.1))
            .map(|(at, _)| at);
        match weakest {
            Some(at) => split.push(keep.remove(at)),
            None => break,
        }
    }
    (keep, split)
}

/// Split the two weakest creatures off a 7-high legion when some roll
/// reaches a worthwhile recruit and every roll has a safe destination
fn split_off_weakest(
    game: &Game,
    player: &Player,
    legion: &Legion,
    weights: &ScoringWeights,
) -> Option<(Vec<CreatureKind>, Vec<CreatureKind>)> {
    let sorted: Vec<CreatureKind> = legion.sorted_creatures().iter().map(|c| c.kind).collect();
    let weakest = sorted.last()?.sort_value();
    let board = game.legions();
    let ctx = game.move_context(player);
    let strength = legion.combat_value();

    let mut good_recruit = false;
    let mut safe_rolls = 0;
    for roll in ROLLS {
        let mut safe = false;
        for (hex, _) in find_all_moves(legion, &board, MoveContext { roll, ..ctx }) {
            if best_recruit_at(legion, hex, &game.pool).is_some_and(|r| r.sort_value() > weakest) {
                good_recruit = true;
            }
            match enemy_in(game, &player.name, hex) {
                Some(enemy) if enemy.combat_value() >= weights.squash * strength => {}
                _ => safe = true,
            }
        }
        if safe {
            safe_rolls += 1;
        }
    }
    if !good_recruit || safe_rolls < ROLLS.count() {
        return None;
    }
    let (keep, split) = sorted.split_at(sorted.len() - 2);
    Some((keep.to_vec(), split.to_vec()))
}

// ============================================================================
// MOVE
// ============================================================================

#[derive(Clone, Debug)]
struct ScoredMove {
    score: f64,
    marker: String,
    destination: MasterMove,
    /// Ends on one of our own legions
    onto_friend: bool,
}

/// Score a legion moving to `hex`: prey and recruits are good, threats bad
pub fn score_move(game: &Game, legion: &Legion, hex: HexLabel, weights: &ScoringWeights) -> f64 {
    let mut score = 0.0;
    let enemy = enemy_in(game, &legion.owner, hex);
    if let Some(enemy) = enemy {
        let ours = legion.combat_value();
        let theirs = enemy.combat_value();
        if theirs < weights.squash * ours {
            score += enemy.score() as f64;
        } else if theirs >= weights.be_squashed * ours {
            score -= ours;
        }
    }
    if legion.height() < MAX_HEIGHT || enemy.is_some() {
        if let Some(recruit) = best_recruit_at(legion, hex, &game.pool) {
            score += recruit.sort_value();
        }
    }
    score
}

/// Next legion move, a mulligan, or `DoneWithMoves`
pub fn choose_move(game: &Game, player: &Player, weights: &ScoringWeights, rng: &mut ChaCha8Rng) -> Command {
    let board = game.legions();
    let ctx = game.move_context(player);
    let moved_any = player.moved_legions() > 0;
    let stacked = |legion: &Legion| {
        player
            .legions
            .values()
            .any(|l| l.marker != legion.marker && l.hex == legion.hex)
    };

    let mut moves: Vec<ScoredMove> = player
        .legions
        .values()
        .filter(|l| !l.moved)
        .flat_map(|legion| {
            find_all_moves(legion, &board, ctx)
                .into_iter()
                .map(move |(hex, side)| ScoredMove {
                    score: score_move(game, legion, hex, weights),
                    marker: legion.marker.clone(),
                    destination: (hex, side),
                    onto_friend: player.legions.values().any(|l| l.marker != legion.marker && l.hex == hex),
                })
        })
        .collect();

    let mulligan_left = game.turn == 1 && game.config.mulligans && player.mulligans_left > 0;
    if !moved_any && mulligan_left {
        let mut promising: Vec<&str> = moves.iter().filter(|m| m.score > 0.0).map(|m| m.marker.as_str()).collect();
        promising.sort_unstable();
        promising.dedup();
        if promising.len() < 2 {
            tracing::debug!("{} takes a mulligan on a roll of {}", player.name, player.movement_roll);
            return Command::TakeMulligan;
        }
    }

    moves.shuffle(rng);
    moves.sort_by(|a, b| a.onto_friend.cmp(&b.onto_friend).then(b.score.total_cmp(&a.score)));

    let must_separate = |m: &&ScoredMove| game.legion(&m.marker).is_some_and(stacked);
    let pick = moves
        .iter()
        .filter(|m| !m.onto_friend)
        .find(must_separate)
        .or_else(|| moves.iter().find(must_separate))
        .or_else(|| moves.iter().find(|m| !m.onto_friend && (m.score > 0.0 || !moved_any)))
        .or_else(|| moves.iter().find(|_| !moved_any));

    match pick {
        Some(chosen) => move_command(game, chosen, rng),
        None => Command::DoneWithMoves,
    }
}

/// Any legal move that `DoneWithMoves` would otherwise refuse to skip: a
/// legion sharing a hex first, then anything while nothing has moved
pub fn unblocking_move(game: &Game, player: &Player, rng: &mut ChaCha8Rng) -> Option<Command> {
    let board = game.legions();
    let ctx = game.move_context(player);
    let moved_any = player.moved_legions() > 0;
    let stacked = |legion: &Legion| {
        player
            .legions
            .values()
            .any(|l| l.marker != legion.marker && l.hex == legion.hex)
    };

    let mut unmoved: Vec<&Legion> = player
        .legions
        .values()
        .filter(|l| !l.moved && (!moved_any || stacked(l)))
        .collect();
    unmoved.sort_by_key(|l| !stacked(l));
    let chosen = unmoved.into_iter().find_map(|legion| {
        let destination = find_all_moves(legion, &board, ctx).into_iter().next()?;
        Some(ScoredMove {
            score: 0.0,
            marker: legion.marker.clone(),
            destination,
            onto_friend: false,
        })
    })?;
    Some(move_command(game, &chosen, rng))
}

fn move_command(game: &Game, chosen: &ScoredMove, rng: &mut ChaCha8Rng) -> Command {
    let (hex, entry_side) = chosen.destination;
    let marker = chosen.marker.clone();
    if entry_side != EntrySide::Teleport {
        return Command::MoveLegion {
            marker,
            hex,
            entry_side,
            teleport: false,
            teleporting_lord: None,
        };
    }
    let side = teleport_entry_sides(hex).choose(rng).copied().unwrap_or(5);
    let lord = game.legion(&chosen.marker).and_then(|legion| {
        if legion.has_titan() {
            Some(CreatureKind::TITAN)
        } else {
            legion.lords().into_iter().max_by(by_sort_value)
        }
    });
    Command::MoveLegion {
        marker,
        hex,
        entry_side: EntrySide::Side(side),
        teleport: true,
        teleporting_lord: lord,
    }
}

// ============================================================================
// ENGAGEMENTS
// ============================================================================

/// Resolve the next engagement, or finish the fight phase
pub fn choose_engagement(game: &Game) -> Command {
    match game.engagements().first() {
        Some(&hex) => Command::ResolveEngagement { hex },
        None => Command::DoneWithEngagements,
    }
}

/// Flee when badly outmatched
pub fn flee_or_fight(game: &Game, engagement: &Engagement, weights: &ScoringWeights) -> Command {
    let marker = engagement.defender.clone();
    let (Some(attacker), Some(defender)) = (game.legion(&engagement.attacker), game.legion(&marker)) else {
        return Command::DoNotFlee { marker };
    };
    if defender.combat_value() < weights.flee_ratio * attacker.combat_value() {
        tracing::debug!("{} flees from {}", marker, attacker.marker);
        Command::Flee { marker }
    } else {
        Command::DoNotFlee { marker }
    }
}

// ============================================================================
// MUSTER
// ============================================================================

/// Recruit the best available creature into the next eligible legion
pub fn choose_recruit(game: &Game, player: &Player) -> Command {
    for legion in player.legions.values().filter(|l| l.can_recruit(&game.pool)) {
        if let Some(creature) = best_recruit(legion, &game.pool) {
            return Command::RecruitCreature {
                marker: legion.marker.clone(),
                creature,
                recruiters: Vec::new(),
            };
        }
    }
    Command::DoneWithRecruits
}

// ============================================================================
// BONUSES
// ============================================================================

/// Take as many angels as offered, archangels first
pub fn choose_acquisition(game: &Game, offer: &Acquisition) -> Command {
    let room = game
        .legion(&offer.marker)
        .map_or(0, |l| MAX_HEIGHT.saturating_sub(l.height()));
    let total = (offer.angels as usize).min(room);
    let archangels = (offer.archangels as usize)
        .min(total)
        .min(game.pool.num_left(CreatureKind::ARCHANGEL) as usize);
    let angels = (total - archangels).min(game.pool.num_left(CreatureKind::ANGEL) as usize);

    let mut taken = vec![CreatureKind::ARCHANGEL; archangels];
    taken.extend(std::iter::repeat(CreatureKind::ANGEL).take(angels));
    if taken.is_empty() {
        return Command::DoNotAcquireAngels {
            marker: offer.marker.clone(),
        };
    }
    Command::AcquireAngels {
        marker: offer.marker.clone(),
        angels: taken,
    }
}

/// The defender's turn-4 reinforcement
pub fn choose_reinforcement(game: &Game, battle: &Battle) -> Command {
    if battle.turn != REINFORCE_TURN || battle.reinforced {
        return Command::DoneWithReinforcements;
    }
    let Some(legion) = game.legion(&battle.defender) else {
        return Command::DoneWithReinforcements;
    };
    if legion.living_height() >= MAX_HEIGHT {
        return Command::DoneWithReinforcements;
    }
    match best_recruit(legion, &game.pool) {
        Some(creature) => Command::RecruitCreature {
            marker: legion.marker.clone(),
            creature,
            recruiters: Vec::new(),
        },
        None => Command::DoneWithReinforcements,
    }
}

/// Summon the strongest angel available to the attacker
pub fn choose_summon(game: &Game, battle: &Battle) -> Command {
    let marker = battle.attacker.clone();
    let room = game.legion(&marker).is_some_and(|l| l.living_height() < MAX_HEIGHT);
    let best = game
        .summon_options()
        .into_iter()
        .max_by(|a, b| by_sort_value(&a.1, &b.1));
    match best {
        Some((donor, creature)) if room && battle.defender_lost && !battle.summoned => Command::SummonAngel {
            marker,
            donor,
            creature,
        },
        _ => Command::DoNotSummonAngel { marker },
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use legions_core::{Creature, CreatureKind as K, EngagementStage, GameConfig, Phase};
    use rand::SeedableRng;

    fn new_game(seed: u64) -> Game {
        let mut game = Game::new("test", GameConfig::default().with_seed(seed));
        game.add_player("alice").unwrap();
        game.add_player("bob").unwrap();
        game.start().unwrap();
        game
    }

    fn active(game: &Game) -> Player {
        game.active_player().unwrap().clone()
    }

    fn legion(marker: &str, owner: &str, hex: HexLabel, kinds: &[K]) -> Legion {
        Legion::new(marker, owner, hex, kinds.iter().map(|&k| Creature::new(k)).collect())
    }

    #[test]
    fn test_opening_split_is_legal() {
        for seed in 0..20 {
            let mut game = new_game(seed);
            let player = active(&game);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let command = choose_split(&game, &player, &ScoringWeights::default(), &mut rng);
            let Command::SplitLegion { keep, split, .. } = &command else {
                panic!("expected a split, got {command:?}");
            };
            assert_eq!(keep.len(), 4);
            assert_eq!(split.len(), 4);
            assert_eq!(split.iter().filter(|k| k.is_lord()).count(), 1);
            // The pair and the single are different types
            let ordinaries: Vec<_> = split.iter().filter(|k| !k.is_lord()).collect();
            assert_eq!(ordinaries[0], ordinaries[1]);
            assert_ne!(ordinaries[1], ordinaries[2]);

            game.execute(&player.name, command).unwrap();
            assert_eq!(game.player(&player.name).unwrap().legions.len(), 2);
        }
    }

    #[test]
    fn test_done_after_opening_split() {
        let mut game = new_game(4);
        let player = active(&game);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let weights = ScoringWeights::default();
        let split = choose_split(&game, &player, &weights, &mut rng);
        game.execute(&player.name, split).unwrap();
        let player = active(&game);
        assert_eq!(choose_split(&game, &player, &weights, &mut rng), Command::DoneWithSplits);
    }

    #[test]
    fn test_moves_until_done() {
        let mut game = new_game(11);
        let name = active(&game).name;
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let weights = ScoringWeights::default();
        let split = choose_split(&game, &active(&game), &weights, &mut rng);
        game.execute(&name, split).unwrap();
        game.execute(&name, Command::DoneWithSplits).unwrap();
        // Disable further mulligans so the roll sticks
        game.player_mut(&name).unwrap().mulligans_left = 0;

        for _ in 0..10 {
            let command = choose_move(&game, &active(&game), &weights, &mut rng);
            if command == Command::DoneWithMoves {
                break;
            }
            game.execute(&name, command).unwrap();
        }
        let player = active(&game);
        // The split stack separated
        assert!(player.moved_legions() >= 1);
        let hexes: Vec<_> = player.legions.values().map(|l| l.hex).collect();
        assert_ne!(hexes[0], hexes[1]);
        game.execute(&name, Command::DoneWithMoves).unwrap();
        assert_eq!(game.phase, Phase::Fight);
    }

    #[test]
    fn test_unblocking_move_separates_the_split() {
        let mut game = new_game(12);
        let name = active(&game).name;
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let split = choose_split(&game, &active(&game), &ScoringWeights::default(), &mut rng);
        game.execute(&name, split).unwrap();
        game.execute(&name, Command::DoneWithSplits).unwrap();
        assert!(game.execute(&name, Command::DoneWithMoves).is_err());

        let command = unblocking_move(&game, &active(&game), &mut rng).unwrap();
        assert!(matches!(command, Command::MoveLegion { .. }));
        game.execute(&name, command).unwrap();

        // Nothing left that has to move
        assert_eq!(unblocking_move(&game, &active(&game), &mut rng), None);
        game.execute(&name, Command::DoneWithMoves).unwrap();
        assert_eq!(game.phase, Phase::Fight);
    }

    #[test]
    fn test_score_move_prefers_prey() {
        let mut game = new_game(2);
        let name = active(&game).name;
        let other = game.players.iter().find(|p| p.name != name).unwrap().name.clone();
        let weights = ScoringWeights::default();
        let ours = legion("Zz01", &name, 1, &[K::TITAN, K::TROLL, K::TROLL, K::RANGER]);

        let prey = legion("Zz02", &other, 2, &[K::OGRE]);
        game.player_mut(&other).unwrap().legions.insert(prey.marker.clone(), prey);
        let threat = legion("Zz03", &other, 3, &[K::COLOSSUS, K::COLOSSUS, K::HYDRA, K::SERPENT]);
        game.player_mut(&other).unwrap().legions.insert(threat.marker.clone(), threat);

        let at_prey = score_move(&game, &ours, 2, &weights);
        let at_threat = score_move(&game, &ours, 3, &weights);
        assert!(at_prey > 0.0);
        assert!(at_threat < 0.0);
    }

    #[test]
    fn test_flee_only_when_outmatched() {
        let mut game = new_game(5);
        let name = active(&game).name;
        let other = game.players.iter().find(|p| p.name != name).unwrap().name.clone();
        let weights = ScoringWeights::default();
        let strong = legion("Zz01", &name, 2, &[K::TITAN, K::TROLL, K::TROLL]);
        let weak = legion("Zz02", &other, 2, &[K::OGRE]);
        let fair = legion("Zz03", &other, 2, &[K::TROLL, K::TROLL, K::TROLL]);
        for l in [weak, fair] {
            game.player_mut(&other).unwrap().legions.insert(l.marker.clone(), l);
        }
        game.player_mut(&name).unwrap().legions.insert(strong.marker.clone(), strong);

        let engagement = |defender: &str| Engagement {
            hex: 2,
            attacker: "Zz01".into(),
            defender: defender.into(),
            stage: EngagementStage::Flee,
        };
        assert_eq!(
            flee_or_fight(&game, &engagement("Zz02"), &weights),
            Command::Flee { marker: "Zz02".into() }
        );
        assert_eq!(
            flee_or_fight(&game, &engagement("Zz03"), &weights),
            Command::DoNotFlee { marker: "Zz03".into() }
        );
    }

    #[test]
    fn test_acquisition_prefers_archangels() {
        let game = new_game(6);
        let name = active(&game).name;
        let marker = game.player(&name).unwrap().legions.keys().next().unwrap().clone();
        // The starting legion is 8 high, so there is no room
        let offer = Acquisition {
            player: name.clone(),
            marker: marker.clone(),
            angels: 2,
            archangels: 1,
        };
        assert_eq!(
            choose_acquisition(&game, &offer),
            Command::DoNotAcquireAngels { marker: marker.clone() }
        );

        let mut game = game;
        let legion = game.player_mut(&name).unwrap().legion_mut(&marker).unwrap();
        legion.creatures.truncate(4);
        assert_eq!(
            choose_acquisition(&game, &offer),
            Command::AcquireAngels {
                marker,
                angels: vec![K::ARCHANGEL, K::ANGEL]
            }
        );
    }

    #[test]
    fn test_recruit_takes_the_best() {
        let mut game = new_game(8);
        let name = active(&game).name;
        let mut recruiter = legion("Zz01", &name, 3, &[K::TROLL, K::TROLL]);
        recruiter.moved = true;
        let best = best_recruit(&recruiter, &game.pool);
        game.player_mut(&name).unwrap().legions.insert(recruiter.marker.clone(), recruiter);
        let player = active(&game);
        match (choose_recruit(&game, &player), best) {
            (Command::RecruitCreature { creature, .. }, Some(best)) => assert_eq!(creature, best),
            (Command::DoneWithRecruits, None) => {}
            (command, best) => panic!("{command:?} with best {best:?}"),
        }
    }
}
