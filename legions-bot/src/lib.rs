//! Legions Bot - a rule-based computer player
//!
//! This crate provides:
//! - Strategic choices on the master board (splits, moves, musters)
//! - A time-bounded maneuver search for battles, plus strike choice
//! - A game runner that plays seated bots to completion
//!
//! The bot never mutates a game. It reads a snapshot and returns the next
//! `Command` for its seat, or `None` when another player must act.

pub mod config;
pub mod runner;
pub mod strategic;
pub mod tactical;
pub mod weights;

pub use config::BotConfig;
pub use runner::{play_game, setup, GameOutcome, RunError};
pub use tactical::{PlannedMove, SearchStats};
pub use weights::ScoringWeights;

use legions_core::{
    find_battle_moves, BattleField, BattlePhase, BattleSide, Command, EngagementStage, Game, HexLabel, Phase,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;

/// Identifies one maneuver phase of one battle
type PlanKey = (HexLabel, u8, BattleSide);

/// A seated computer player
pub struct Bot {
    name: String,
    config: BotConfig,
    rng: ChaCha8Rng,
    plan: Option<(PlanKey, VecDeque<PlannedMove>)>,
}

impl Bot {
    pub fn new(name: &str, config: BotConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            name: name.to_string(),
            config,
            rng,
            plan: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Drop any half-sent maneuver plan
    pub fn reset_plan(&mut self) {
        self.plan = None;
    }

    /// Next command for this seat, or None if someone else must act
    pub fn choose(&mut self, game: &Game) -> Option<Command> {
        if game.decision_maker()? != self.name {
            return None;
        }
        let weights = &self.config.weights;

        if let Some(offer) = &game.acquisition {
            return Some(strategic::choose_acquisition(game, offer));
        }
        if let Some(battle) = &game.battle {
            let field = game.battle_field()?;
            return Some(match battle.phase {
                BattlePhase::Reinforce if battle.active == BattleSide::Defender => {
                    strategic::choose_reinforcement(game, battle)
                }
                BattlePhase::Reinforce => strategic::choose_summon(game, battle),
                BattlePhase::Maneuver => self.next_maneuver(&field, battle.hex),
                _ => tactical::choose_strike(&field, battle),
            });
        }
        if let Some(engagement) = &game.engagement {
            return Some(match engagement.stage {
                EngagementStage::Flee => strategic::flee_or_fight(game, engagement, weights),
                EngagementStage::Fight | EngagementStage::Battle => Command::Fight {
                    attacker: engagement.attacker.clone(),
                    defender: engagement.defender.clone(),
                },
            });
        }

        let player = game.player(&self.name)?;
        Some(match game.phase {
            Phase::Split => strategic::choose_split(game, player, weights, &mut self.rng),
            Phase::Move => strategic::choose_move(game, player, weights, &mut self.rng),
            Phase::Fight => strategic::choose_engagement(game),
            Phase::Muster => strategic::choose_recruit(game, player),
        })
    }

    /// A command that always moves the game along, for when a chosen
    /// command was rejected
    pub fn fallback(&mut self, game: &Game) -> Option<Command> {
        if game.decision_maker()? != self.name {
            return None;
        }
        if let Some(offer) = &game.acquisition {
            return Some(Command::DoNotAcquireAngels {
                marker: offer.marker.clone(),
            });
        }
        if let Some(battle) = &game.battle {
            return Some(match battle.phase {
                BattlePhase::Reinforce if battle.active == BattleSide::Defender => Command::DoneWithReinforcements,
                BattlePhase::Reinforce => Command::DoNotSummonAngel {
                    marker: battle.attacker.clone(),
                },
                BattlePhase::Maneuver => Command::DoneWithManeuvers,
                BattlePhase::Counterstrike => Command::DoneWithCounterstrikes,
                _ => Command::DoneWithStrikes,
            });
        }
        if let Some(engagement) = &game.engagement {
            return Some(match engagement.stage {
                EngagementStage::Flee => Command::DoNotFlee {
                    marker: engagement.defender.clone(),
                },
                _ => Command::Fight {
                    attacker: engagement.attacker.clone(),
                    defender: engagement.defender.clone(),
                },
            });
        }
        if game.phase == Phase::Move {
            let player = game.player(&self.name)?;
            if let Some(command) = strategic::unblocking_move(game, player, &mut self.rng) {
                return Some(command);
            }
        }
        Some(match game.phase {
            Phase::Split => Command::DoneWithSplits,
            Phase::Move => Command::DoneWithMoves,
            Phase::Fight => Command::DoneWithEngagements,
            Phase::Muster => Command::DoneWithRecruits,
        })
    }

    /// Pop the next still-legal planned move, planning first if this is a
    /// new maneuver phase
    fn next_maneuver(&mut self, field: &BattleField, hex: HexLabel) -> Command {
        let key = (hex, field.turn, field.active);
        if self.plan.as_ref().map(|(k, _)| *k) != Some(key) {
            let (moves, stats) = tactical::plan_maneuver(field, field.active, &self.config, &mut self.rng);
            tracing::debug!(
                "{} planned {} moves ({} assignments, {} scored, timed out: {})",
                self.name,
                moves.len(),
                stats.assignments,
                stats.scored,
                stats.timed_out
            );
            self.plan = Some((key, moves.into()));
        }

        let Some((_, queue)) = self.plan.as_mut() else {
            return Command::DoneWithManeuvers;
        };
        while let Some(planned) = queue.pop_front() {
            let Some(i) = field.find(field.active, planned.slot) else {
                continue;
            };
            let fighter = &field.fighters[i];
            if fighter.creature.hex != planned.from || fighter.creature.kind != planned.kind {
                continue;
            }
            if !find_battle_moves(field, i, false).contains(&planned.to) {
                tracing::debug!("{} skips a blocked move of {}", self.name, planned.kind);
                continue;
            }
            return Command::MoveCreature {
                creature: planned.kind,
                from: planned.from.map(|id| field.map.label(id).to_string()),
                to: field.map.label(planned.to).to_string(),
            };
        }
        Command::DoneWithManeuvers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use legions_core::GameConfig;

    fn new_game(seed: u64) -> Game {
        let mut game = Game::new("test", GameConfig::default().with_seed(seed));
        game.add_player("bot1").unwrap();
        game.add_player("bot2").unwrap();
        game.start().unwrap();
        game
    }

    #[test]
    fn test_only_acts_for_its_seat() {
        let game = new_game(1);
        let active = game.decision_maker().unwrap().to_string();
        let idle = if active == "bot1" { "bot2" } else { "bot1" };

        let mut waiting = Bot::new(idle, BotConfig::default().with_seed(1));
        assert_eq!(waiting.choose(&game), None);
        assert_eq!(waiting.fallback(&game), None);

        let mut acting = Bot::new(&active, BotConfig::default().with_seed(1));
        assert!(matches!(acting.choose(&game), Some(Command::SplitLegion { .. })));
        assert_eq!(acting.fallback(&game), Some(Command::DoneWithSplits));
    }

    #[test]
    fn test_fallback_moves_before_done() {
        let mut game = new_game(5);
        let name = game.decision_maker().unwrap().to_string();
        let mut bot = Bot::new(&name, BotConfig::default().with_seed(5));
        let split = bot.choose(&game).unwrap();
        game.execute(&name, split).unwrap();
        game.execute(&name, Command::DoneWithSplits).unwrap();

        // Done is refused while nothing has moved, so the fallback moves
        let command = bot.fallback(&game).unwrap();
        assert!(matches!(command, Command::MoveLegion { .. }));
        game.execute(&name, command).unwrap();
        assert_eq!(bot.fallback(&game), Some(Command::DoneWithMoves));
        game.execute(&name, Command::DoneWithMoves).unwrap();
    }

    #[test]
    fn test_first_turn_is_accepted() {
        let mut game = new_game(9);
        let name = game.decision_maker().unwrap().to_string();
        let mut bot = Bot::new(&name, BotConfig::default().with_seed(9).with_time_limit_ms(50));
        let mut sent = 0;
        // Split, move and muster until the turn passes
        while game.decision_maker() == Some(name.as_str()) && game.turn == 1 && sent < 50 {
            let command = bot.choose(&game).unwrap();
            game.execute(&name, command).unwrap();
            sent += 1;
        }
        assert!(sent >= 4);
        assert_eq!(game.player(&name).unwrap().legions.len(), 2);
    }
}
