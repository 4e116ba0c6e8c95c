//! Battle decisions: the maneuver search, move ordering and strike choice
//!
//! The maneuver search runs in three steps:
//! 1. Score every reachable hex for each creature in isolation (mobile
//!    allies ignored) and keep the best few per creature
//! 2. Combine the per-creature candidates into whole-legion assignments
//!    with distinct hexes and score each with final positions
//! 3. Find an order of single moves that keeps as much of the chosen
//!    assignment legal as possible
//!
//! All scoring happens on cloned `BattleField` snapshots. Both searches
//! stop at the wall-clock deadline and return the best found so far.

use crate::config::BotConfig;
use crate::weights::ScoringWeights;
use legions_core::{
    expected_hits, find_battle_moves, Battle, BattleField, BattleHexId, BattlePhase, BattleSide, Command,
    CreatureKind, Hazard, MAX_HEIGHT,
};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use std::time::Instant;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Battle turn from which titans are allowed forward
const TITAN_CAUTION_TURNS: u8 = 4;

/// Assignments scored between deadline checks
const DEADLINE_STRIDE: usize = 256;

/// One hex (or the entrance) per creature, in search order
type Assignment = [Option<BattleHexId>; MAX_HEIGHT];

// ============================================================================
// PLANNED MOVES
// ============================================================================

/// One creature move from a maneuver plan
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlannedMove {
    /// Index of the creature in its legion
    pub slot: usize,
    pub kind: CreatureKind,
    pub from: Option<BattleHexId>,
    pub to: BattleHexId,
}

/// Search statistics, for logging
#[derive(Clone, Copy, Debug, Default)]
pub struct SearchStats {
    pub assignments: usize,
    pub scored: usize,
    pub orders_tried: usize,
    pub timed_out: bool,
}

// ============================================================================
// MANEUVER SEARCH (main coordination)
// ============================================================================

/// Plan this maneuver phase for `side`: moves in the order to send them
pub fn plan_maneuver(
    field: &BattleField,
    side: BattleSide,
    config: &BotConfig,
    rng: &mut ChaCha8Rng,
) -> (Vec<PlannedMove>, SearchStats) {
    let deadline = Instant::now() + config.time_limit();
    let weights = &config.weights;
    let mut stats = SearchStats::default();

    let creatures = search_order(field, side);
    if creatures.is_empty() {
        return (Vec::new(), stats);
    }
    let mut scratch = field.clone();
    scratch.phase = BattlePhase::Strike;

    let candidates: Vec<Vec<Option<BattleHexId>>> = creatures
        .iter()
        .map(|&i| candidate_hexes(&scratch, i, weights, config.max_candidates, rng))
        .collect();

    let mut assignments = combine(&candidates, deadline);
    stats.assignments = assignments.len();
    assignments.shuffle(rng);

    let mut best = greedy_assignment(&candidates);
    let mut best_score = score_assignment(&mut scratch, &creatures, &best, weights);
    for (n, assignment) in assignments.iter().enumerate() {
        let score = score_assignment(&mut scratch, &creatures, assignment, weights);
        stats.scored += 1;
        if score > best_score {
            best_score = score;
            best = *assignment;
        }
        if n % DEADLINE_STRIDE == 0 && Instant::now() > deadline {
            stats.timed_out = true;
            break;
        }
    }

    let moves: Vec<PlannedMove> = creatures
        .iter()
        .zip(best.iter())
        .filter_map(|(&i, &to)| {
            let creature = &field.fighters[i].creature;
            match to {
                Some(to) if Some(to) != creature.hex => Some(PlannedMove {
                    slot: field.fighters[i].slot,
                    kind: creature.kind,
                    from: creature.hex,
                    to,
                }),
                _ => None,
            }
        })
        .collect();

    let (ordered, tried) = order_moves(field, side, moves, rng, deadline);
    stats.orders_tried = tried;
    stats.timed_out |= Instant::now() > deadline;
    tracing::debug!(
        "maneuver search for {:?}: {} assignments, {} scored, {} orders, best {:.2}{}",
        side,
        stats.assignments,
        stats.scored,
        stats.orders_tried,
        best_score,
        if stats.timed_out { " (timed out)" } else { "" }
    );
    (ordered, stats)
}

/// Living creatures of a side, strongest first
fn search_order(field: &BattleField, side: BattleSide) -> Vec<usize> {
    let mut creatures: Vec<usize> = field
        .side(side)
        .filter(|&i| !field.fighters[i].creature.is_dead())
        .collect();
    creatures.sort_by(|&a, &b| {
        let (a, b) = (&field.fighters[a].creature, &field.fighters[b].creature);
        b.sort_value().total_cmp(&a.sort_value())
    });
    creatures.truncate(MAX_HEIGHT);
    creatures
}

/// The best few hexes for one creature, scored alone. Staying put is an
/// option unless the creature is still off the board.
fn candidate_hexes(
    field: &BattleField,
    fighter: usize,
    weights: &ScoringWeights,
    limit: usize,
    rng: &mut ChaCha8Rng,
) -> Vec<Option<BattleHexId>> {
    let here = field.fighters[fighter].creature.hex;
    let mut moves: Vec<BattleHexId> = find_battle_moves(field, fighter, true).into_iter().collect();
    if moves.is_empty() {
        return vec![here];
    }
    if let Some(here) = here {
        moves.push(here);
    }

    let mut trial = field.clone();
    let mut scored: Vec<(f64, BattleHexId)> = moves
        .into_iter()
        .map(|hex| {
            trial.fighters[fighter].creature.hex = Some(hex);
            (score_creature(&trial, fighter, weights), hex)
        })
        .collect();
    // Shuffle first so the stable sort breaks ties randomly
    scored.shuffle(rng);
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().take(limit.max(1)).map(|(_, hex)| Some(hex)).collect()
}

/// Every combination of one candidate per creature with no shared hex
fn combine(candidates: &[Vec<Option<BattleHexId>>], deadline: Instant) -> Vec<Assignment> {
    fn extend(
        candidates: &[Vec<Option<BattleHexId>>],
        depth: usize,
        current: &mut Assignment,
        out: &mut Vec<Assignment>,
        deadline: Instant,
    ) -> bool {
        if depth == candidates.len() {
            out.push(*current);
            return out.len() % DEADLINE_STRIDE != 0 || Instant::now() <= deadline;
        }
        for &hex in &candidates[depth] {
            if hex.is_some() && current[..depth].contains(&hex) {
                continue;
            }
            current[depth] = hex;
            if !extend(candidates, depth + 1, current, out, deadline) {
                return false;
            }
        }
        true
    }

    let mut out = Vec::new();
    let mut current = [None; MAX_HEIGHT];
    extend(candidates, 0, &mut current, &mut out, deadline);
    out
}

/// Each creature takes its favorite hex not already taken
fn greedy_assignment(candidates: &[Vec<Option<BattleHexId>>]) -> Assignment {
    let mut assignment = [None; MAX_HEIGHT];
    for (depth, options) in candidates.iter().enumerate() {
        let free = options
            .iter()
            .find(|hex| hex.is_none() || !assignment[..depth].contains(hex))
            .or_else(|| options.last());
        assignment[depth] = free.copied().flatten();
    }
    assignment
}

fn score_assignment(
    scratch: &mut BattleField,
    creatures: &[usize],
    assignment: &Assignment,
    weights: &ScoringWeights,
) -> f64 {
    for (&i, &hex) in creatures.iter().zip(assignment.iter()) {
        scratch.fighters[i].creature.hex = hex;
    }
    creatures.iter().map(|&i| score_creature(scratch, i, weights)).sum()
}

// ============================================================================
// POSITION SCORING
// ============================================================================

/// Score one creature where it stands. `field.phase` should be Strike so
/// rangestrike targets are visible.
pub fn score_creature(field: &BattleField, fighter: usize, weights: &ScoringWeights) -> f64 {
    let me = &field.fighters[fighter];
    let Some(hex) = me.creature.hex else {
        // Left at the entrance: dies at the end of the maneuver
        return -weights.death_penalty * me.creature.sort_value().max(1.0);
    };
    let map = field.map;
    let mut score = 0.0;

    let engaged = field.engaged_enemies(fighter);
    let mut probable_kill = false;
    let mut max_mean_hits: f64 = 0.0;
    let mut damage_taken = 0.0;
    for &enemy in &engaged {
        let mean = expected_hits(field.number_of_dice(fighter, enemy, false), field.strike_number(fighter, enemy));
        probable_kill |= mean >= field.fighters[enemy].creature.hits_left() as f64;
        max_mean_hits = max_mean_hits.max(mean);
        damage_taken += expected_hits(field.number_of_dice(enemy, fighter, false), field.strike_number(enemy, fighter));
    }
    let probable_death = damage_taken >= me.creature.hits_left() as f64;

    let targets = if engaged.is_empty() {
        field.rangestrike_targets(fighter)
    } else {
        Vec::new()
    };
    for &enemy in &targets {
        let mean = expected_hits(field.number_of_dice(fighter, enemy, true), field.strike_number(fighter, enemy));
        probable_kill |= mean >= field.fighters[enemy].creature.hits_left() as f64;
        max_mean_hits = max_mean_hits.max(mean);
    }
    if !targets.is_empty() {
        score += weights.rangestrike_bonus;
    }

    let allies = field
        .side(me.side)
        .filter(|&i| !field.fighters[i].creature.is_dead())
        .count();
    let cautious_titan = me.creature.is_titan() && field.turn < TITAN_CAUTION_TURNS && allies > 1;

    if !cautious_titan {
        score += weights.hit_bonus * max_mean_hits;
        if probable_kill {
            score += weights.kill_bonus;
        }
    }
    score -= weights.damage_penalty * damage_taken;
    if probable_death {
        score -= weights.death_penalty;
    }

    // The attacker loses on time unless it closes in
    if me.side == BattleSide::Attacker && !cautious_titan {
        if !engaged.is_empty() || !targets.is_empty() {
            score += weights.attacker_aggression_bonus;
        } else {
            let nearest = field
                .side(BattleSide::Defender)
                .filter(|&i| !field.fighters[i].creature.is_dead())
                .filter_map(|i| field.fighters[i].creature.hex)
                .map(|enemy| map.distance(hex, enemy))
                .min();
            if let Some(range) = nearest {
                score -= range as f64 * weights.attacker_distance_penalty;
            }
        }
    }

    let battle_hex = map.hex(hex);
    if me.creature.is_titan() && field.turn < TITAN_CAUTION_TURNS && battle_hex.hazard != Hazard::Tower {
        let distance = map.distance_from_entrance(me.side, hex).saturating_sub(1);
        score -= distance as f64 * weights.titan_forward_penalty;
    }

    score += battle_hex.elevation as f64 * weights.elevation_bonus;
    match battle_hex.hazard {
        Hazard::Bramble if me.creature.is_native(Hazard::Bramble) => score += weights.native_bramble_bonus,
        Hazard::Bramble => score -= weights.non_native_bramble_penalty,
        Hazard::Tower => score += weights.tower_bonus,
        Hazard::Drift if !me.creature.is_native(Hazard::Drift) => score -= weights.non_native_drift_penalty,
        Hazard::Volcano => score += weights.native_volcano_bonus,
        _ => {}
    }

    let adjacent_allies = map
        .neighbors(hex)
        .filter_map(|(_, n)| field.occupant(n))
        .filter(|&i| i != fighter && field.fighters[i].side == me.side && !field.fighters[i].creature.is_dead())
        .count();
    score += adjacent_allies as f64 * weights.adjacent_ally_bonus;

    score
}

// ============================================================================
// MOVE ORDER
// ============================================================================

/// Order the moves so that as many as possible stay legal when made one at
/// a time. Returns the order and how many orders were tried.
fn order_moves(
    field: &BattleField,
    side: BattleSide,
    moves: Vec<PlannedMove>,
    rng: &mut ChaCha8Rng,
    deadline: Instant,
) -> (Vec<PlannedMove>, usize) {
    if moves.len() < 2 {
        return (moves, 0);
    }
    let value = |m: &PlannedMove| {
        field
            .find(side, m.slot)
            .map_or(0.0, |i| field.fighters[i].creature.sort_value())
    };
    let max_score: f64 = moves.iter().map(value).sum();

    let mut orders = permutations(moves.len());
    orders.shuffle(rng);

    let mut best: Option<(f64, &Vec<usize>)> = None;
    let mut tried = 0;
    for order in &orders {
        tried += 1;
        let mut sim = field.clone();
        let mut score = 0.0;
        for &k in order {
            let planned = &moves[k];
            let Some(i) = sim.find(side, planned.slot) else {
                continue;
            };
            if find_battle_moves(&sim, i, false).contains(&planned.to) {
                sim.place(i, Some(planned.to));
                score += value(planned);
            }
        }
        if best.map_or(true, |(s, _)| score > s) {
            best = Some((score, order));
        }
        if score >= max_score || Instant::now() > deadline {
            break;
        }
    }
    let ordered = match best {
        Some((_, order)) => order.iter().map(|&k| moves[k]).collect(),
        None => moves,
    };
    (ordered, tried)
}

/// All orderings of 0..n
fn permutations(n: usize) -> Vec<Vec<usize>> {
    fn build(rest: &mut Vec<usize>, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if rest.is_empty() {
            out.push(current.clone());
            return;
        }
        for k in 0..rest.len() {
            let item = rest.remove(k);
            current.push(item);
            build(rest, current, out);
            current.pop();
            rest.insert(k, item);
        }
    }
    let mut out = Vec::new();
    build(&mut (0..n).collect(), &mut Vec::with_capacity(n), &mut out);
    out
}

// ============================================================================
// STRIKES
// ============================================================================

/// Next strike or carry for the striking side, or the done verb
pub fn choose_strike(field: &BattleField, battle: &Battle) -> Command {
    let side = battle.striking_side();
    let done = if battle.phase == BattlePhase::Counterstrike {
        Command::DoneWithCounterstrikes
    } else {
        Command::DoneWithStrikes
    };
    let label = |i: usize| {
        field.fighters[i]
            .creature
            .hex
            .map(|h| field.map.label(h).to_string())
    };

    if let Some(pending) = &battle.pending_carry {
        let (Some(s), Some(t)) = (field.occupant(pending.striker), field.occupant(pending.target)) else {
            return done;
        };
        return match choose_carry(field, s, t, pending.strike_number, pending.hits).and_then(label) {
            Some(target) => Command::Carry { target },
            None => done,
        };
    }

    let mut best: Option<(f64, usize, usize)> = None;
    for s in field.can_strike(side) {
        let engaged = field.engaged_enemies(s);
        for t in field.strike_targets(s) {
            let value = strike_value(field, s, t, !engaged.contains(&t));
            if best.map_or(true, |(v, _, _)| value > v) {
                best = Some((value, s, t));
            }
        }
    }
    match best.and_then(|(_, s, t)| Some((label(s)?, label(t)?))) {
        Some((striker, target)) => Command::Strike { striker, target },
        None => done,
    }
}

/// Expected share of the target destroyed, weighted by its worth and
/// doubled for a likely kill
fn strike_value(field: &BattleField, striker: usize, target: usize, rangestrike: bool) -> f64 {
    let victim = &field.fighters[target].creature;
    let hits_left = victim.hits_left().max(1) as f64;
    let mean = expected_hits(
        field.number_of_dice(striker, target, rangestrike),
        field.strike_number(striker, target),
    );
    let worth = victim.sort_value();
    let mut value = mean.min(hits_left) / hits_left * worth;
    if mean >= hits_left {
        value += worth;
    }
    value
}

/// Carry to the most valuable target the hits can finish, else the most
/// valuable one
fn choose_carry(field: &BattleField, striker: usize, target: usize, strike_number: u8, hits: u8) -> Option<usize> {
    let targets = field.carry_targets(striker, target, strike_number);
    let worth = |i: &usize| field.fighters[*i].creature.sort_value();
    let finishable = targets
        .iter()
        .copied()
        .filter(|&i| field.fighters[i].creature.hits_left() <= hits)
        .max_by(|a, b| worth(a).total_cmp(&worth(b)));
    finishable.or_else(|| targets.iter().copied().max_by(|a, b| worth(a).total_cmp(&worth(b))))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use legions_core::battle::PendingCarry;
    use legions_core::{Creature, CreatureKind as K, Legion, Terrain};
    use rand::SeedableRng;

    fn legion(marker: &str, owner: &str, kinds: &[K]) -> Legion {
        Legion::new(marker, owner, 1, kinds.iter().map(|&k| Creature::new(k)).collect())
    }

    fn setup(terrain: Terrain, attackers: &[K], defenders: &[K]) -> (Battle, BattleField) {
        let a = legion("Rd01", "p0", attackers);
        let d = legion("Bu01", "p1", defenders);
        let battle = Battle::new(1, terrain, &a, &d);
        let field = BattleField::new(&battle, &a, &d);
        (battle, field)
    }

    fn at(field: &mut BattleField, fighter: usize, label: &str) {
        let hex = field.map.by_label(label).unwrap();
        field.fighters[fighter].creature.hex = Some(hex);
    }

    fn quick() -> BotConfig {
        BotConfig::default().with_seed(1).with_time_limit_ms(2_000)
    }

    #[test]
    fn test_permutations() {
        assert_eq!(permutations(3).len(), 6);
        assert_eq!(permutations(5).len(), 120);
        let mut all = permutations(3);
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 6);
    }

    #[test]
    fn test_combine_keeps_hexes_distinct() {
        let candidates = vec![vec![Some(1), Some(2)], vec![Some(1), Some(2)], vec![Some(2), Some(3)]];
        let far = Instant::now() + std::time::Duration::from_secs(5);
        let all = combine(&candidates, far);
        // (1,2,3) and (2,1,3) only
        assert_eq!(all.len(), 2);
        for a in &all {
            assert_ne!(a[0], a[1]);
            assert_ne!(a[1], a[2]);
            assert_ne!(a[0], a[2]);
        }
    }

    #[test]
    fn test_kill_scores_above_idle() {
        let (_, mut field) = setup(Terrain::Plains, &[K::TROLL], &[K::GARGOYLE]);
        field.phase = BattlePhase::Strike;
        at(&mut field, 1, "D4");
        let weights = ScoringWeights::default();

        at(&mut field, 0, "C4");
        let engaged = score_creature(&field, 0, &weights);
        at(&mut field, 0, "A1");
        let distant = score_creature(&field, 0, &weights);
        assert!(engaged > distant, "{engaged} <= {distant}");
    }

    #[test]
    fn test_titan_hangs_back_early() {
        let (_, mut field) = setup(Terrain::Plains, &[K::TITAN, K::OGRE], &[K::TROLL]);
        field.phase = BattlePhase::Strike;
        at(&mut field, 2, "F1");
        let weights = ScoringWeights::default();

        at(&mut field, 0, "A1");
        let back = score_creature(&field, 0, &weights);
        at(&mut field, 0, "D4");
        let forward = score_creature(&field, 0, &weights);
        assert!(back > forward);

        field.turn = TITAN_CAUTION_TURNS;
        at(&mut field, 0, "E2");
        let engaged_late = score_creature(&field, 0, &weights);
        at(&mut field, 0, "A1");
        let back_late = score_creature(&field, 0, &weights);
        assert!(engaged_late > back_late);
    }

    #[test]
    fn test_plan_enters_every_creature() {
        let (battle, mut field) = setup(
            Terrain::Plains,
            &[K::TITAN, K::ANGEL],
            &[K::OGRE, K::OGRE, K::CENTAUR, K::GARGOYLE],
        );
        field.phase = BattlePhase::Maneuver;
        assert_eq!(battle.active, BattleSide::Defender);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let (plan, stats) = plan_maneuver(&field, BattleSide::Defender, &quick(), &mut rng);

        assert_eq!(plan.len(), 4);
        assert!(stats.assignments > 0);
        let mut targets: Vec<_> = plan.iter().map(|m| m.to).collect();
        targets.sort();
        targets.dedup();
        assert_eq!(targets.len(), 4);

        // Replaying the plan in order keeps every move legal
        let mut sim = field.clone();
        for planned in &plan {
            assert!(planned.from.is_none());
            let i = sim.find(BattleSide::Defender, planned.slot).unwrap();
            assert_eq!(sim.fighters[i].creature.kind, planned.kind);
            assert!(find_battle_moves(&sim, i, false).contains(&planned.to));
            sim.place(i, Some(planned.to));
        }
    }

    #[test]
    fn test_plan_is_reproducible_with_a_seed() {
        let (_, mut field) = setup(Terrain::Brush, &[K::TROLL, K::OGRE, K::CENTAUR], &[K::LION, K::LION]);
        field.phase = BattlePhase::Maneuver;
        let first = plan_maneuver(&field, BattleSide::Defender, &quick(), &mut ChaCha8Rng::seed_from_u64(9)).0;
        let second = plan_maneuver(&field, BattleSide::Defender, &quick(), &mut ChaCha8Rng::seed_from_u64(9)).0;
        assert_eq!(first, second);
    }

    #[test]
    fn test_engaged_creature_stays() {
        let (_, mut field) = setup(Terrain::Plains, &[K::OGRE], &[K::TROLL]);
        field.phase = BattlePhase::Maneuver;
        field.active = BattleSide::Attacker;
        at(&mut field, 0, "C4");
        at(&mut field, 1, "D4");
        let (plan, _) = plan_maneuver(&field, BattleSide::Attacker, &quick(), &mut ChaCha8Rng::seed_from_u64(1));
        assert!(plan.is_empty());
    }

    #[test]
    fn test_strike_prefers_the_kill() {
        let (mut battle, mut field) = setup(Terrain::Plains, &[K::COLOSSUS], &[K::CENTAUR, K::OGRE]);
        battle.phase = BattlePhase::Strike;
        battle.active = BattleSide::Attacker;
        field.phase = BattlePhase::Strike;
        field.active = BattleSide::Attacker;
        at(&mut field, 0, "D4");
        at(&mut field, 1, "D3");
        at(&mut field, 2, "D5");
        // Wound the Ogre so it is nearly dead
        field.fighters[2].creature.hits = 5;
        let command = choose_strike(&field, &battle);
        assert_eq!(
            command,
            Command::Strike {
                striker: "D4".into(),
                target: "D5".into()
            }
        );
    }

    #[test]
    fn test_nothing_to_strike_means_done() {
        let (mut battle, field) = setup(Terrain::Plains, &[K::OGRE], &[K::TROLL]);
        battle.phase = BattlePhase::Counterstrike;
        assert_eq!(choose_strike(&field, &battle), Command::DoneWithCounterstrikes);
    }

    #[test]
    fn test_carry_finishes_off() {
        let (mut battle, mut field) = setup(Terrain::Plains, &[K::COLOSSUS], &[K::CENTAUR, K::CENTAUR, K::OGRE]);
        battle.phase = BattlePhase::Strike;
        battle.active = BattleSide::Attacker;
        at(&mut field, 0, "D4");
        at(&mut field, 1, "D3");
        at(&mut field, 2, "C4");
        at(&mut field, 3, "D5");
        field.fighters[2].creature.hits = 2;
        let sn = field.strike_number(0, 1);
        battle.pending_carry = Some(PendingCarry {
            striker: field.map.by_label("D4").unwrap(),
            target: field.map.by_label("D3").unwrap(),
            strike_number: sn,
            hits: 1,
        });
        // One hit finishes the wounded Centaur but not the Ogre
        assert_eq!(choose_strike(&field, &battle), Command::Carry { target: "C4".into() });
    }
}
