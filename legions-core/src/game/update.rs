//! Applying actions to a game
//!
//! This is the only place game state changes. The verbs build actions and
//! route them through here, and mirrors replay the same records.

use super::{Acquisition, Engagement, EngagementStage, Game};
use crate::action::Action;
use crate::battle::{Battle, PendingCarry};
use crate::battlemap::{BattleHexId, BattleSide};
use crate::board::terrain_of;
use crate::creature::Creature;
use crate::error::{invariant, GameError, Result};
use crate::legion::{Legion, RecruitRecord, STARTING_CREATURES};
use crate::phase::{BattlePhase, Phase};

impl Game {
    /// Apply one action. Fails only when the action does not fit the
    /// current state, which for a verb-built action is a bug.
    pub fn update(&mut self, action: &Action) -> Result<()> {
        self.apply(action)?;
        self.history.push(action.clone());
        Ok(())
    }

    fn apply(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::GameStarted { seats } => {
                let mut unseated = std::mem::take(&mut self.players);
                for seat in seats {
                    let Some(i) = unseated.iter().position(|p| p.name == seat.player) else {
                        return invariant(format!("no player {} to seat", seat.player));
                    };
                    let mut player = unseated.remove(i);
                    player.assign_color(seat.color);
                    player.starting_tower = Some(seat.tower);
                    player.mulligans_left = u8::from(self.config.mulligans);
                    player.take_marker(&seat.marker)?;
                    let creatures = STARTING_CREATURES
                        .iter()
                        .map(|&kind| {
                            if kind.is_titan() {
                                Creature::titan(player.score)
                            } else {
                                Creature::new(kind)
                            }
                        })
                        .collect();
                    for kind in STARTING_CREATURES {
                        self.pool.take_one(kind)?;
                    }
                    player.add_legion(Legion::new(&seat.marker, &seat.player, seat.tower, creatures))?;
                    self.players.push(player);
                }
                self.players.extend(unseated);
                self.started = true;
                self.active = 0;
                self.turn = 1;
                self.phase = Phase::Split;
                tracing::info!(
                    "{} started with {}",
                    self.name,
                    seats.iter().map(|s| s.player.as_str()).collect::<Vec<_>>().join(", ")
                );
            }
            Action::StartSplitPhase { player, turn } => {
                let Some(i) = self.players.iter().position(|p| &p.name == player) else {
                    return invariant(format!("no player {player}"));
                };
                self.active = i;
                self.turn = *turn;
                self.phase = Phase::Split;
                self.players[i].reset_turn();
                tracing::debug!("{} turn {}: {} to split", self.name, turn, player);
            }
            Action::SplitLegion {
                player,
                parent,
                child,
                child_creatures,
                ..
            } => {
                let owner = self.player_entry(player)?;
                owner.take_marker(child)?;
                let source = owner
                    .legion_mut(parent)
                    .ok_or_else(|| GameError::InvariantViolation(format!("no legion {parent}")))?;
                let hex = source.hex;
                let mut moved = Vec::with_capacity(child_creatures.len());
                for &kind in child_creatures {
                    moved.push(source.remove_creature(kind)?);
                }
                owner.add_legion(Legion::new(child, player, hex, moved))?;
            }
            Action::UndoSplit {
                player, parent, child, ..
            } => {
                let owner = self.player_entry(player)?;
                let absorbed = owner.remove_legion(child)?;
                let target = owner
                    .legion_mut(parent)
                    .ok_or_else(|| GameError::InvariantViolation(format!("no legion {parent}")))?;
                target.creatures.extend(absorbed.creatures);
            }
            Action::DoneSplitting { player } => {
                self.finish_phase(player, Phase::Split)?;
                self.phase = Phase::Move;
            }
            Action::RollMovement { player, roll, mulligan } => {
                let owner = self.player_entry(player)?;
                owner.movement_roll = *roll;
                if *mulligan {
                    owner.mulligans_left = owner.mulligans_left.saturating_sub(1);
                }
            }
            Action::MoveLegion {
                player,
                marker,
                hex,
                entry_side,
                teleport,
                teleporting_lord,
                ..
            } => {
                self.legion_mut(marker)?
                    .move_to(*hex, *teleport, *entry_side, *teleporting_lord);
                if *teleport {
                    self.player_entry(player)?.teleported = true;
                }
            }
            Action::UndoMoveLegion {
                player,
                marker,
                teleport,
                ..
            } => {
                self.legion_mut(marker)?.undo_move();
                if *teleport {
                    self.player_entry(player)?.teleported = false;
                }
            }
            Action::MergeLegions {
                player,
                survivor,
                absorbed,
                returned,
            } => {
                let owner = self.player_entry(player)?;
                let absorbed = owner.remove_legion(absorbed)?;
                let target = owner
                    .legion_mut(survivor)
                    .ok_or_else(|| GameError::InvariantViolation(format!("no legion {survivor}")))?;
                target.creatures.extend(absorbed.creatures);
                for &kind in returned {
                    target.remove_creature(kind)?;
                }
                for &kind in returned {
                    self.pool.put_one_back(kind)?;
                }
            }
            Action::DoneMoving { player } => {
                self.finish_phase(player, Phase::Move)?;
                self.phase = Phase::Fight;
            }
            Action::ResolvingEngagement { hex, attacker, defender } => {
                let can_flee = self
                    .legion(defender)
                    .ok_or_else(|| GameError::InvariantViolation(format!("no legion {defender}")))?
                    .can_flee();
                self.engagement = Some(Engagement {
                    hex: *hex,
                    attacker: attacker.clone(),
                    defender: defender.clone(),
                    stage: if can_flee {
                        EngagementStage::Flee
                    } else {
                        EngagementStage::Fight
                    },
                });
            }
            Action::DoNotFlee { .. } => {
                if let Some(engagement) = &mut self.engagement {
                    engagement.stage = EngagementStage::Fight;
                }
            }
            Action::Flee { .. } | Action::Concede { .. } | Action::DoNotSummonAngel { .. } => {}
            Action::StartBattle { hex, attacker, defender } => {
                let Some(terrain) = terrain_of(*hex) else {
                    return invariant(format!("no master hex {hex}"));
                };
                self.legion_mut(attacker)?.reset_battle_state();
                self.legion_mut(defender)?.reset_battle_state();
                let battle = match (self.legion(attacker), self.legion(defender)) {
                    (Some(a), Some(d)) => Battle::new(*hex, terrain, a, d),
                    _ => return invariant(format!("cannot fight {attacker} against {defender}")),
                };
                self.battle = Some(battle);
                if let Some(engagement) = &mut self.engagement {
                    engagement.stage = EngagementStage::Battle;
                }
                tracing::debug!("{} battle in {}: {} attacks {}", self.name, hex, attacker, defender);
            }
            Action::BattlePhaseStarted { turn, side, phase } => {
                let battle = self.current_battle_mut()?;
                battle.turn = *turn;
                battle.active = *side;
                battle.phase = *phase;
                battle.pending_carry = None;
                let reset = match phase {
                    BattlePhase::Maneuver | BattlePhase::Strike => Some(*side),
                    BattlePhase::Counterstrike => Some(side.other()),
                    _ => None,
                };
                if let Some(reset) = reset {
                    let marker = battle.marker(reset).to_string();
                    let maneuver = *phase == BattlePhase::Maneuver;
                    for creature in &mut self.legion_mut(&marker)?.creatures {
                        if maneuver {
                            creature.moved = false;
                        } else {
                            creature.struck = false;
                        }
                    }
                }
            }
            Action::SummonAngel {
                marker,
                donor,
                creature,
                ..
            } => {
                let mut angel = self.legion_mut(donor)?.remove_creature(*creature)?;
                angel.reset_battle_state();
                let score = angel.score();
                self.legion_mut(marker)?.add_creature(angel)?;
                let battle = self.current_battle_mut()?;
                battle.summoned = true;
                *battle.value_mut(BattleSide::Attacker) += score;
            }
            Action::MoveCreature { marker, slot, from, to } => {
                let creature = self.creature_mut(marker, *slot)?;
                creature.previous_hex = *from;
                creature.hex = Some(*to);
                creature.moved = true;
            }
            Action::UndoMoveCreature { marker, slot, from, .. } => {
                let creature = self.creature_mut(marker, *slot)?;
                creature.hex = *from;
                creature.previous_hex = None;
                creature.moved = false;
            }
            Action::KillOffboard { marker, slots } => {
                for &slot in slots {
                    let creature = self.creature_mut(marker, slot)?;
                    creature.hits = creature.power;
                }
            }
            Action::Strike {
                striker,
                target,
                strike_number,
                hits,
                carries,
                ..
            } => {
                let (marker, slot) = self.fighter_at(*striker)?;
                self.creature_mut(&marker, slot)?.struck = true;
                let (marker, slot) = self.fighter_at(*target)?;
                let victim = self.creature_mut(&marker, slot)?;
                victim.hits = victim.hits.saturating_add(*hits).min(victim.power);
                if *carries > 0 {
                    self.current_battle_mut()?.pending_carry = Some(PendingCarry {
                        striker: *striker,
                        target: *target,
                        strike_number: *strike_number,
                        hits: *carries,
                    });
                }
            }
            Action::Carry {
                target,
                hits,
                carries_left,
            } => {
                let (marker, slot) = self.fighter_at(*target)?;
                let victim = self.creature_mut(&marker, slot)?;
                victim.hits = victim.hits.saturating_add(*hits).min(victim.power);
                let battle = self.current_battle_mut()?;
                if *carries_left == 0 {
                    battle.pending_carry = None;
                } else if let Some(pending) = &mut battle.pending_carry {
                    pending.hits = *carries_left;
                }
            }
            Action::DriftDamage { hexes } => {
                for &hex in hexes {
                    let (marker, slot) = self.fighter_at(hex)?;
                    let creature = self.creature_mut(&marker, slot)?;
                    creature.hits = (creature.hits + 1).min(creature.power);
                }
            }
            Action::RemoveDeadCreatures { dead } => {
                let defender = self.current_battle_mut()?.defender.clone();
                for (marker, kind) in dead {
                    let legion = self.legion_mut(marker)?;
                    let Some(i) = legion.creatures.iter().position(|c| c.kind == *kind && c.is_dead()) else {
                        return invariant(format!("{marker} has no dead {kind}"));
                    };
                    legion.creatures.remove(i);
                    self.pool.kill_one(*kind)?;
                    if *marker == defender {
                        self.current_battle_mut()?.defender_lost = true;
                    }
                }
            }
            Action::BattleOver {
                hex, winner, time_loss, ..
            } => {
                self.battle = None;
                self.engagement = None;
                if let Some(winner) = winner {
                    self.legion_mut(winner)?.reset_battle_state();
                }
                tracing::info!(
                    "{} engagement in {} won by {}{}",
                    self.name,
                    hex,
                    winner.as_deref().unwrap_or("nobody"),
                    if *time_loss { " on time" } else { "" }
                );
            }
            Action::ScorePoints { player, points } => self.player_entry(player)?.add_score(*points),
            Action::AcquisitionOffered {
                player,
                marker,
                angels,
                archangels,
            } => {
                self.acquisition = Some(Acquisition {
                    player: player.clone(),
                    marker: marker.clone(),
                    angels: *angels,
                    archangels: *archangels,
                });
            }
            Action::AcquireAngels { marker, angels, .. } => {
                for &kind in angels {
                    self.pool.take_one(kind)?;
                    self.legion_mut(marker)?.add_creature(Creature::new(kind))?;
                }
                self.acquisition = None;
            }
            Action::DoNotAcquireAngels { .. } => self.acquisition = None,
            Action::RemoveLegion {
                player,
                marker,
                to_graveyard,
            } => {
                let legion = self.player_entry(player)?.remove_legion(marker)?;
                for creature in &legion.creatures {
                    if *to_graveyard {
                        self.pool.kill_one(creature.kind)?;
                    } else {
                        self.pool.put_one_back(creature.kind)?;
                    }
                }
            }
            Action::CaptureMarkers { player, from } => {
                let captured = std::mem::take(&mut self.player_entry(from)?.markers);
                self.player_entry(player)?.markers.extend(captured);
            }
            Action::EliminatePlayers { deaths } => {
                let mut group = Vec::with_capacity(deaths.len());
                for (name, slayer) in deaths {
                    self.player_entry(name)?.dead = true;
                    group.push(name.clone());
                    tracing::info!(
                        "{} eliminated {} (slain by {})",
                        self.name,
                        name,
                        slayer.as_deref().unwrap_or("nobody")
                    );
                }
                self.finish_order.insert(0, group);
                let living: Vec<String> = self.living_players().map(|p| p.name.clone()).collect();
                if living.len() <= 1 {
                    if !living.is_empty() {
                        self.finish_order.insert(0, living);
                    }
                    self.over = true;
                }
            }
            Action::GameOver { winner } => {
                self.over = true;
                tracing::info!(
                    "{} over after turn {}, winner {}",
                    self.name,
                    self.turn,
                    winner.as_deref().unwrap_or("none")
                );
            }
            Action::DoneFighting { player } => {
                self.finish_phase(player, Phase::Fight)?;
                self.phase = Phase::Muster;
            }
            Action::RecruitCreature {
                marker,
                creature,
                recruiters,
                ..
            } => {
                self.pool.take_one(*creature)?;
                let recruit = Creature::new(*creature);
                let score = recruit.score();
                self.legion_mut(marker)?.add_creature(recruit)?;
                match &mut self.battle {
                    Some(battle) if battle.defender == *marker => {
                        battle.reinforced = true;
                        *battle.value_mut(BattleSide::Defender) += score;
                    }
                    _ => {
                        self.legion_mut(marker)?.recruited = Some(RecruitRecord {
                            creature: *creature,
                            recruiters: recruiters.clone(),
                        });
                    }
                }
            }
            Action::UndoRecruit { marker, creature, .. } => {
                let legion = self.legion_mut(marker)?;
                legion.remove_creature(*creature)?;
                legion.recruited = None;
                self.pool.put_one_back(*creature)?;
            }
            Action::DoneRecruiting { player } => self.finish_phase(player, Phase::Muster)?,
        }
        Ok(())
    }

    fn finish_phase(&mut self, player: &str, phase: Phase) -> Result<()> {
        let turn = self.turn;
        self.player_entry(player)?.last_done = Some((turn, phase));
        Ok(())
    }

    fn current_battle_mut(&mut self) -> Result<&mut Battle> {
        self.battle
            .as_mut()
            .ok_or_else(|| GameError::InvariantViolation("no battle in progress".into()))
    }

    fn creature_mut(&mut self, marker: &str, slot: usize) -> Result<&mut Creature> {
        self.legion_mut(marker)?
            .creatures
            .get_mut(slot)
            .ok_or_else(|| GameError::InvariantViolation(format!("{marker} has no creature {slot}")))
    }

    /// Legion marker and slot of the creature on a battle hex
    pub(crate) fn fighter_at(&self, hex: BattleHexId) -> Result<(String, usize)> {
        let Some(battle) = &self.battle else {
            return invariant("no battle in progress");
        };
        for marker in [&battle.attacker, &battle.defender] {
            if let Some(legion) = self.legion(marker) {
                if let Some(slot) = legion.creatures.iter().position(|c| c.hex == Some(hex)) {
                    return Ok((marker.clone(), slot));
                }
            }
        }
        invariant(format!("nobody on battle hex {hex}"))
    }
}
