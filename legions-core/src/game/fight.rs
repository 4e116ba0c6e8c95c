//! Fight-phase verbs: engagements and the battle sub-phases

use super::outcome::Outcome;
use super::{EngagementStage, Game};
use crate::action::Action;
use crate::battle::{BattleField, REINFORCE_TURN};
use crate::battlemap::{BattleHexId, BattleSide, Hazard};
use crate::board::HexLabel;
use crate::creature::CreatureKind;
use crate::error::{illegal_move, illegal_recruit, invariant, out_of_turn, GameError, Result};
use crate::legion::MAX_HEIGHT;
use crate::movement::find_battle_moves;
use crate::phase::{BattlePhase, Phase};

impl Game {
    // ========================================================================
    // ENGAGEMENTS
    // ========================================================================

    pub(crate) fn resolve_engagement(&mut self, player: &str, hex: HexLabel, out: &mut Vec<Action>) -> Result<()> {
        self.require_phase(player, Phase::Fight)?;
        self.require_idle()?;
        if !self.engagements().contains(&hex) {
            return illegal_move(format!("no engagement in {hex}"));
        }
        let here = self.legions_in(hex);
        let attacker = here.iter().find(|l| l.owner == player);
        let defender = here.iter().find(|l| l.owner != player);
        let (Some(attacker), Some(defender)) = (attacker, defender) else {
            return invariant(format!("{hex} is not contested"));
        };
        let action = Action::ResolvingEngagement {
            hex,
            attacker: attacker.marker.clone(),
            defender: defender.marker.clone(),
        };
        self.emit(out, action)
    }

    pub(crate) fn flee(&mut self, player: &str, marker: &str, out: &mut Vec<Action>) -> Result<()> {
        let engagement = match &self.engagement {
            Some(e) if e.stage == EngagementStage::Flee && e.defender == marker => e.clone(),
            _ => return out_of_turn(format!("{marker} is not being asked to flee")),
        };
        let points = self.owned_legion(player, marker)?.score() / 2;
        self.emit(
            out,
            Action::Flee {
                player: player.to_string(),
                marker: marker.to_string(),
            },
        )?;
        self.conclude(
            out,
            Outcome {
                winner: Some(engagement.attacker),
                losers: vec![engagement.defender],
                points,
                to_graveyard: false,
                time_loss: false,
            },
        )
    }

    pub(crate) fn do_not_flee(&mut self, player: &str, marker: &str, out: &mut Vec<Action>) -> Result<()> {
        match &self.engagement {
            Some(e) if e.stage == EngagementStage::Flee && e.defender == marker => {}
            _ => return out_of_turn(format!("{marker} is not being asked to flee")),
        }
        self.owned_legion(player, marker)?;
        self.emit(
            out,
            Action::DoNotFlee {
                player: player.to_string(),
                marker: marker.to_string(),
            },
        )
    }

    pub(crate) fn concede(&mut self, player: &str, marker: &str, out: &mut Vec<Action>) -> Result<()> {
        if self.acquisition.is_some() {
            return out_of_turn("an angel acquisition is pending");
        }
        let Some(engagement) = self.engagement.clone() else {
            return out_of_turn("no engagement to concede");
        };
        let winner = if engagement.attacker == marker {
            engagement.defender
        } else if engagement.defender == marker {
            engagement.attacker
        } else {
            return out_of_turn(format!("{marker} is not in the engagement"));
        };
        let conceding = self.owned_legion(player, marker)?;
        let points = match &self.battle {
            Some(battle) => match battle.side_of(marker) {
                Some(BattleSide::Attacker) => battle.attacker_value,
                _ => battle.defender_value,
            },
            None => conceding.score(),
        };
        self.emit(
            out,
            Action::Concede {
                player: player.to_string(),
                marker: marker.to_string(),
            },
        )?;
        self.conclude(
            out,
            Outcome {
                winner: Some(winner),
                losers: vec![marker.to_string()],
                points,
                to_graveyard: true,
                time_loss: false,
            },
        )
    }

    pub(crate) fn fight(&mut self, player: &str, attacker: &str, defender: &str, out: &mut Vec<Action>) -> Result<()> {
        let hex = match &self.engagement {
            Some(e) if e.stage == EngagementStage::Fight && e.attacker == attacker && e.defender == defender => e.hex,
            _ => return out_of_turn(format!("{attacker} cannot fight {defender} now")),
        };
        self.owned_legion(player, attacker)?;
        self.emit(
            out,
            Action::StartBattle {
                hex,
                attacker: attacker.to_string(),
                defender: defender.to_string(),
            },
        )?;
        self.advance_battle(out)
    }

    pub(crate) fn done_with_engagements(&mut self, player: &str, out: &mut Vec<Action>) -> Result<()> {
        if self.already_done(player, Phase::Fight) {
            return Ok(());
        }
        self.require_phase(player, Phase::Fight)?;
        self.require_idle()?;
        if let Some(hex) = self.engagements().first() {
            return out_of_turn(format!("engagement in {hex} is unresolved"));
        }
        self.emit(out, Action::DoneFighting { player: player.to_string() })
    }

    // ========================================================================
    // BATTLE FLOW
    // ========================================================================

    /// Run automatic battle steps until someone has a decision to make or
    /// the battle ends
    pub(crate) fn advance_battle(&mut self, out: &mut Vec<Action>) -> Result<()> {
        loop {
            let (Some(battle), Some(field)) = (&self.battle, self.battle_field()) else {
                return Ok(());
            };
            let (turn, side, phase) = (battle.turn, battle.active, battle.phase);
            let carry_pending = battle.pending_carry.is_some();
            let next = match phase {
                BattlePhase::Reinforce if self.reinforce_pending() => return Ok(()),
                BattlePhase::Reinforce => BattlePhase::Maneuver,
                BattlePhase::Maneuver => return Ok(()),
                BattlePhase::Strike if carry_pending || !field.can_strike(side).is_empty() => return Ok(()),
                BattlePhase::Strike => BattlePhase::DriftDamage,
                BattlePhase::DriftDamage => {
                    let hexes = drifting(&field, side);
                    if !hexes.is_empty() {
                        self.emit(out, Action::DriftDamage { hexes })?;
                    }
                    BattlePhase::Counterstrike
                }
                BattlePhase::Counterstrike if carry_pending || !field.can_strike(side.other()).is_empty() => {
                    return Ok(())
                }
                BattlePhase::Counterstrike => BattlePhase::Cleanup,
                BattlePhase::Cleanup => {
                    if self.cleanup(out)? {
                        continue;
                    }
                    return Ok(());
                }
            };
            self.emit(out, Action::BattlePhaseStarted { turn, side, phase: next })?;
        }
    }

    /// Whether the active side has a reinforcement or summon to decide
    fn reinforce_pending(&self) -> bool {
        let Some(battle) = &self.battle else {
            return false;
        };
        match battle.active {
            BattleSide::Defender => {
                battle.turn == REINFORCE_TURN
                    && !battle.reinforced
                    && self.legion(&battle.defender).is_some_and(|l| {
                        l.living_height() < MAX_HEIGHT && !l.available_recruits(&self.pool).is_empty()
                    })
            }
            BattleSide::Attacker => {
                !battle.summoned
                    && battle.defender_lost
                    && self
                        .legion(&battle.attacker)
                        .is_some_and(|l| l.living_height() < MAX_HEIGHT)
                    && !self.summon_options().is_empty()
            }
        }
    }

    /// Angels the attacker could summon: (donor legion, creature)
    pub fn summon_options(&self) -> Vec<(String, CreatureKind)> {
        let Some(battle) = &self.battle else {
            return Vec::new();
        };
        let Some(owner) = self.player(&battle.attacker_player) else {
            return Vec::new();
        };
        let contested = |hex: HexLabel| self.legions_in(hex).iter().any(|l| l.owner != owner.name);
        owner
            .legions
            .values()
            .filter(|l| l.marker != battle.attacker && !contested(l.hex))
            .flat_map(|l| l.summonables().into_iter().map(|kind| (l.marker.clone(), kind)))
            .collect()
    }

    /// Remove the dead, then end the battle or start the next half-turn.
    /// Returns whether the battle goes on.
    fn cleanup(&mut self, out: &mut Vec<Action>) -> Result<bool> {
        let Some(battle) = self.battle.clone() else {
            return Ok(false);
        };
        let mut dead = Vec::new();
        for marker in [&battle.attacker, &battle.defender] {
            if let Some(legion) = self.legion(marker) {
                dead.extend(legion.creatures.iter().filter(|c| c.is_dead()).map(|c| (marker.clone(), c.kind)));
            }
        }
        let titan_died = |marker: &str| dead.iter().any(|(m, kind)| m == marker && kind.is_titan());
        let attacker_lost = titan_died(&battle.attacker);
        let defender_lost = titan_died(&battle.defender);
        if !dead.is_empty() {
            self.emit(out, Action::RemoveDeadCreatures { dead })?;
        }
        let empty = |game: &Game, marker: &str| game.legion(marker).map_or(true, |l| l.height() == 0);
        let attacker_lost = attacker_lost || empty(self, &battle.attacker);
        let defender_lost = defender_lost || empty(self, &battle.defender);

        let outcome = match (attacker_lost, defender_lost) {
            (true, true) => Outcome {
                winner: None,
                losers: vec![battle.attacker.clone(), battle.defender.clone()],
                points: 0,
                to_graveyard: true,
                time_loss: false,
            },
            (true, false) => Outcome {
                winner: Some(battle.defender.clone()),
                losers: vec![battle.attacker.clone()],
                points: battle.attacker_value,
                to_graveyard: true,
                time_loss: false,
            },
            (false, true) => Outcome {
                winner: Some(battle.attacker.clone()),
                losers: vec![battle.defender.clone()],
                points: battle.defender_value,
                to_graveyard: true,
                time_loss: false,
            },
            (false, false) if battle.active == BattleSide::Attacker && battle.turn >= self.config.max_battle_turns => {
                Outcome {
                    winner: Some(battle.defender.clone()),
                    losers: vec![battle.attacker.clone()],
                    points: 0,
                    to_graveyard: true,
                    time_loss: true,
                }
            }
            (false, false) => {
                let (turn, side) = match battle.active {
                    BattleSide::Defender => (battle.turn, BattleSide::Attacker),
                    BattleSide::Attacker => (battle.turn + 1, BattleSide::Defender),
                };
                self.emit(
                    out,
                    Action::BattlePhaseStarted {
                        turn,
                        side,
                        phase: BattlePhase::Reinforce,
                    },
                )?;
                return Ok(true);
            }
        };
        self.conclude(out, outcome)?;
        Ok(false)
    }

    /// The battle is in `phase` and `player` owns the side that acts in it
    fn require_battle_phase(&self, player: &str, phase: BattlePhase) -> Result<BattleSide> {
        let Some(battle) = &self.battle else {
            return out_of_turn("no battle in progress");
        };
        if battle.phase != phase {
            return out_of_turn(format!("battle is in the {} phase, not {}", battle.phase, phase));
        }
        let side = battle.striking_side();
        if battle.player(side) != player {
            return out_of_turn(format!("{player} does not act in this battle phase"));
        }
        Ok(side)
    }

    fn start_maneuver(&mut self, out: &mut Vec<Action>) -> Result<()> {
        let Some(battle) = &self.battle else {
            return invariant("no battle in progress");
        };
        let action = Action::BattlePhaseStarted {
            turn: battle.turn,
            side: battle.active,
            phase: BattlePhase::Maneuver,
        };
        self.emit(out, action)
    }

    fn field(&self) -> Result<BattleField> {
        self.battle_field()
            .ok_or_else(|| GameError::InvariantViolation("no battle in progress".into()))
    }

    fn battle_hex(field: &BattleField, label: &str) -> Result<BattleHexId> {
        field
            .map
            .by_label(label)
            .ok_or_else(|| GameError::IllegalMove(format!("no battle hex {label}")))
    }

    // ========================================================================
    // REINFORCE
    // ========================================================================

    pub(crate) fn reinforce(
        &mut self,
        player: &str,
        marker: &str,
        creature: CreatureKind,
        recruiters: Vec<CreatureKind>,
        out: &mut Vec<Action>,
    ) -> Result<()> {
        let side = self.require_battle_phase(player, BattlePhase::Reinforce)?;
        let Some(battle) = &self.battle else {
            return out_of_turn("no battle in progress");
        };
        if side != BattleSide::Defender || battle.turn != REINFORCE_TURN {
            return illegal_recruit(format!("{marker} may only reinforce on battle turn {REINFORCE_TURN}"));
        }
        if battle.reinforced {
            return illegal_recruit(format!("{marker} already reinforced"));
        }
        let legion = self.owned_legion(player, marker)?;
        if legion.living_height() >= MAX_HEIGHT {
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
        )?;
        self.start_maneuver(out)
    }

    pub(crate) fn done_with_reinforcements(&mut self, player: &str, out: &mut Vec<Action>) -> Result<()> {
        self.require_battle_phase(player, BattlePhase::Reinforce)?;
        self.start_maneuver(out)
    }

    pub(crate) fn summon_angel(
        &mut self,
        player: &str,
        marker: &str,
        donor: &str,
        creature: CreatureKind,
        out: &mut Vec<Action>,
    ) -> Result<()> {
        let side = self.require_battle_phase(player, BattlePhase::Reinforce)?;
        let Some(battle) = &self.battle else {
            return out_of_turn("no battle in progress");
        };
        if side != BattleSide::Attacker || battle.attacker != marker {
            return out_of_turn(format!("{marker} cannot summon now"));
        }
        if battle.summoned || !battle.defender_lost {
            return illegal_move("summoning needs a defender loss and only happens once per battle");
        }
        if self.owned_legion(player, marker)?.living_height() >= MAX_HEIGHT {
            return invariant(format!("{marker} is already {MAX_HEIGHT} high"));
        }
        if !self.summon_options().contains(&(donor.to_string(), creature)) {
            return illegal_move(format!("cannot summon a {creature} from {donor}"));
        }
        self.emit(
            out,
            Action::SummonAngel {
                player: player.to_string(),
                marker: marker.to_string(),
                donor: donor.to_string(),
                creature,
            },
        )?;
        self.start_maneuver(out)
    }

    pub(crate) fn do_not_summon_angel(&mut self, player: &str, marker: &str, out: &mut Vec<Action>) -> Result<()> {
        let side = self.require_battle_phase(player, BattlePhase::Reinforce)?;
        if side != BattleSide::Attacker || self.battle.as_ref().is_some_and(|b| b.attacker != marker) {
            return out_of_turn(format!("{marker} is not summoning"));
        }
        self.emit(
            out,
            Action::DoNotSummonAngel {
                player: player.to_string(),
                marker: marker.to_string(),
            },
        )?;
        self.start_maneuver(out)
    }

    // ========================================================================
    // MANEUVER
    // ========================================================================

    pub(crate) fn move_creature(
        &mut self,
        player: &str,
        creature: CreatureKind,
        from: Option<&str>,
        to: &str,
        out: &mut Vec<Action>,
    ) -> Result<()> {
        let side = self.require_battle_phase(player, BattlePhase::Maneuver)?;
        let field = self.field()?;
        let to = Self::battle_hex(&field, to)?;
        let from = from.map(|label| Self::battle_hex(&field, label)).transpose()?;
        let Some(fighter) = field.side(side).find(|&i| {
            let c = &field.fighters[i].creature;
            c.kind == creature && c.hex == from && !c.moved && !c.is_dead()
        }) else {
            return illegal_move(format!("no unmoved {creature} there"));
        };
        if !find_battle_moves(&field, fighter, false).contains(&to) {
            return illegal_move(format!("{} cannot reach {}", creature, field.map.label(to)));
        }
        let Some(battle) = &self.battle else {
            return invariant("no battle in progress");
        };
        let action = Action::MoveCreature {
            marker: battle.marker(side).to_string(),
            slot: field.fighters[fighter].slot,
            from,
            to,
        };
        self.emit(out, action)
    }

    pub(crate) fn undo_move_creature(
        &mut self,
        player: &str,
        creature: CreatureKind,
        hex: &str,
        out: &mut Vec<Action>,
    ) -> Result<()> {
        let side = self.require_battle_phase(player, BattlePhase::Maneuver)?;
        let field = self.field()?;
        let hex = Self::battle_hex(&field, hex)?;
        let Some(fighter) = field.side(side).find(|&i| {
            let c = &field.fighters[i].creature;
            c.kind == creature && c.hex == Some(hex) && c.moved
        }) else {
            return invariant(format!("no moved {creature} there"));
        };
        let Some(battle) = &self.battle else {
            return invariant("no battle in progress");
        };
        let action = Action::UndoMoveCreature {
            marker: battle.marker(side).to_string(),
            slot: field.fighters[fighter].slot,
            from: field.fighters[fighter].creature.previous_hex,
            to: hex,
        };
        self.emit(out, action)
    }

    pub(crate) fn done_with_maneuvers(&mut self, player: &str, out: &mut Vec<Action>) -> Result<()> {
        let side = self.require_battle_phase(player, BattlePhase::Maneuver)?;
        let field = self.field()?;
        let Some(battle) = &self.battle else {
            return invariant("no battle in progress");
        };
        let (marker, turn) = (battle.marker(side).to_string(), battle.turn);
        let slots: Vec<usize> = field
            .side(side)
            .map(|i| &field.fighters[i])
            .filter(|f| f.creature.hex.is_none() && !f.creature.is_dead())
            .map(|f| f.slot)
            .collect();
        if !slots.is_empty() {
            self.emit(out, Action::KillOffboard { marker, slots })?;
        }
        self.emit(
            out,
            Action::BattlePhaseStarted {
                turn,
                side,
                phase: BattlePhase::Strike,
            },
        )?;
        self.advance_battle(out)
    }

    // ========================================================================
    // STRIKE
    // ========================================================================

    /// The battle phase in which `player` strikes, if any
    fn striking_phase(&self, player: &str) -> Result<(BattlePhase, BattleSide)> {
        let Some(battle) = &self.battle else {
            return out_of_turn("no battle in progress");
        };
        match battle.phase {
            BattlePhase::Strike | BattlePhase::Counterstrike => {
                let side = self.require_battle_phase(player, battle.phase)?;
                Ok((battle.phase, side))
            }
            phase => out_of_turn(format!("cannot strike in the {phase} phase")),
        }
    }

    pub(crate) fn strike(&mut self, player: &str, striker: &str, target: &str, out: &mut Vec<Action>) -> Result<()> {
        let (_, side) = self.striking_phase(player)?;
        if self.battle.as_ref().is_some_and(|b| b.pending_carry.is_some()) {
            return out_of_turn("a carry must be assigned first");
        }
        let field = self.field()?;
        let from = Self::battle_hex(&field, striker)?;
        let to = Self::battle_hex(&field, target)?;
        let s = match field.occupant(from) {
            Some(i) if field.fighters[i].side == side && !field.fighters[i].creature.struck => i,
            _ => return illegal_move(format!("nothing on {striker} can strike")),
        };
        let Some(t) = field.occupant(to).filter(|t| field.strike_targets(s).contains(t)) else {
            return illegal_move(format!("{striker} cannot strike {target}"));
        };

        let rangestrike = !field.engaged_enemies(s).contains(&t);
        let dice = field.number_of_dice(s, t, rangestrike);
        let strike_number = field.strike_number(s, t);
        let rolls: Vec<u8> = (0..dice).map(|_| self.roll_die()).collect();
        let hits = rolls.iter().filter(|&&r| r >= strike_number).count() as u8;
        let excess = hits.saturating_sub(field.fighters[t].creature.hits_left());
        let carries = if !rangestrike && excess > 0 && !field.carry_targets(s, t, strike_number).is_empty() {
            excess
        } else {
            0
        };
        self.emit(
            out,
            Action::Strike {
                striker: from,
                target: to,
                dice,
                strike_number,
                rolls,
                hits,
                rangestrike,
                carries,
            },
        )?;
        self.advance_battle(out)
    }

    pub(crate) fn carry(&mut self, player: &str, target: &str, out: &mut Vec<Action>) -> Result<()> {
        self.striking_phase(player)?;
        let Some(pending) = self.battle.as_ref().and_then(|b| b.pending_carry.clone()) else {
            return out_of_turn("no carry pending");
        };
        let field = self.field()?;
        let to = Self::battle_hex(&field, target)?;
        let (Some(s), Some(t)) = (field.occupant(pending.striker), field.occupant(pending.target)) else {
            return invariant("striker or target left the field");
        };
        let targets = field.carry_targets(s, t, pending.strike_number);
        let Some(c) = field.occupant(to).filter(|c| targets.contains(c)) else {
            return illegal_move(format!("cannot carry to {target}"));
        };
        let hits = pending.hits.min(field.fighters[c].creature.hits_left());
        let rest = pending.hits - hits;
        let carries_left = if rest > 0 && targets.iter().any(|&o| o != c) {
            rest
        } else {
            0
        };
        self.emit(
            out,
            Action::Carry {
                target: to,
                hits,
                carries_left,
            },
        )?;
        self.advance_battle(out)
    }

    pub(crate) fn done_with_strikes(&mut self, player: &str, out: &mut Vec<Action>) -> Result<()> {
        self.done_striking(player, BattlePhase::Strike, BattlePhase::DriftDamage, out)
    }

    pub(crate) fn done_with_counterstrikes(&mut self, player: &str, out: &mut Vec<Action>) -> Result<()> {
        self.done_striking(player, BattlePhase::Counterstrike, BattlePhase::Cleanup, out)
    }

    fn done_striking(&mut self, player: &str, phase: BattlePhase, next: BattlePhase, out: &mut Vec<Action>) -> Result<()> {
        let side = self.require_battle_phase(player, phase)?;
        let field = self.field()?;
        if let Some(&owing) = field.must_strike(side).first() {
            return illegal_move(format!(
                "engaged {} on {} must strike",
                field.fighters[owing].creature.kind,
                field.fighters[owing].creature.hex.map_or("-", |h| field.map.label(h))
            ));
        }
        let Some(battle) = &self.battle else {
            return invariant("no battle in progress");
        };
        let action = Action::BattlePhaseStarted {
            turn: battle.turn,
            side: battle.active,
            phase: next,
        };
        self.emit(out, action)?;
        self.advance_battle(out)
    }
}

/// Non-native creatures of `side` standing in drift
fn drifting(field: &BattleField, side: BattleSide) -> Vec<BattleHexId> {
    field
        .side(side)
        .map(|i| &field.fighters[i].creature)
        .filter(|c| !c.is_dead() && !c.is_native(Hazard::Drift))
        .filter_map(|c| c.hex)
        .filter(|&hex| field.map.hex(hex).hazard == Hazard::Drift)
        .collect()
}
