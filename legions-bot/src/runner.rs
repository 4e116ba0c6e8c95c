//! Game runner - plays seated bots through a whole game

use crate::config::BotConfig;
use crate::Bot;
use legions_core::{Command, Game, GameConfig, GameError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected commands in a row, after the fallback, before giving up
const MAX_CONSECUTIVE_FAILURES: usize = 8;

/// Commands per game turn before the game is considered stuck
const COMMANDS_PER_TURN: usize = 2_000;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("game setup failed: {0}")]
    Setup(#[from] GameError),

    #[error("{player} is stuck: {reason}")]
    Stuck { player: String, reason: String },
}

/// Outcome of a single game
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameOutcome {
    /// Sole survivor, if there is one
    pub winner: Option<String>,
    /// Groups of players, best placed first
    pub finish_order: Vec<Vec<String>>,
    pub turns: u32,
    pub commands: usize,
    /// Final score per player, in seat order
    pub scores: Vec<(String, u32)>,
    /// False when the turn cap stopped the game
    pub finished: bool,
}

impl GameOutcome {
    fn from_game(game: &Game, commands: usize) -> Self {
        let winner = match game.finish_order.first() {
            Some(group) if game.over && group.len() == 1 && game.player(&group[0]).is_some_and(|p| !p.dead) => {
                Some(group[0].clone())
            }
            _ => None,
        };
        Self {
            winner,
            finish_order: game.finish_order.clone(),
            turns: game.turn,
            commands,
            scores: game.players.iter().map(|p| (p.name.clone(), p.score)).collect(),
            finished: game.over,
        }
    }

    /// Check if the game ended in a shared finish (mutual titan kill)
    pub fn is_draw(&self) -> bool {
        self.finished && self.winner.is_none()
    }
}

/// Create a started game with `players` bots named bot1, bot2, ...
pub fn setup(players: usize, seed: u64, game_config: GameConfig, bot_config: &BotConfig) -> Result<(Game, Vec<Bot>), RunError> {
    let mut game = Game::new(&format!("game-{seed}"), game_config.with_seed(seed));
    let mut bots = Vec::with_capacity(players);
    for i in 0..players {
        let name = format!("bot{}", i + 1);
        game.add_player(&name)?;
        let config = bot_config.clone().with_seed(seed.wrapping_add(i as u64 + 1));
        bots.push(Bot::new(&name, config));
    }
    game.start()?;
    Ok((game, bots))
}

/// Play until the game ends or `max_turns` is passed
pub fn play_game(game: &mut Game, bots: &mut [Bot], max_turns: u32) -> Result<GameOutcome, RunError> {
    let mut commands = 0;
    let mut failures = 0;

    while !game.over && game.turn <= max_turns {
        let Some(name) = game.decision_maker().map(str::to_string) else {
            break;
        };
        let Some(bot) = bots.iter_mut().find(|b| b.name() == name) else {
            return Err(RunError::Stuck {
                player: name,
                reason: "no bot in this seat".to_string(),
            });
        };

        let command = match failures {
            0 => bot.choose(game),
            // Replan once before settling for a fallback
            1 => {
                bot.reset_plan();
                bot.choose(game)
            }
            _ => bot.fallback(game),
        };
        let Some(command) = command else {
            return Err(RunError::Stuck {
                player: name,
                reason: "no command to send".to_string(),
            });
        };

        match game.execute(&name, command.clone()) {
            Ok(_) => failures = 0,
            Err(e) => {
                tracing::warn!("{} rejected {} from {}: {}", game.name, command.verb(), name, e);
                failures += 1;
                if failures > MAX_CONSECUTIVE_FAILURES {
                    return Err(RunError::Stuck {
                        player: name,
                        reason: e.to_string(),
                    });
                }
            }
        }
        commands += 1;
        if commands > COMMANDS_PER_TURN * (game.turn as usize + 1) {
            return Err(RunError::Stuck {
                player: name,
                reason: format!("{} commands by turn {}", commands, game.turn),
            });
        }
        if matches!(command, Command::DoneWithManeuvers) {
            bot.reset_plan();
        }
    }

    let outcome = GameOutcome::from_game(game, commands);
    tracing::info!(
        "{} ended on turn {} after {} commands, winner {}",
        game.name,
        outcome.turns,
        outcome.commands,
        outcome.winner.as_deref().unwrap_or("none")
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_seats_every_bot() {
        let (game, bots) = setup(3, 5, GameConfig::default(), &BotConfig::default()).unwrap();
        assert_eq!(game.players.len(), 3);
        let names: Vec<_> = bots.iter().map(|b| b.name().to_string()).collect();
        assert_eq!(names, ["bot1", "bot2", "bot3"]);
        assert_eq!(bots[0].config().seed, Some(6));
    }

    #[test]
    fn test_setup_rejects_too_many_players() {
        assert!(matches!(
            setup(7, 1, GameConfig::default(), &BotConfig::default()),
            Err(RunError::Setup(_))
        ));
    }

    #[test]
    fn test_turn_cap_stops_early() {
        let config = BotConfig::default().with_time_limit_ms(20);
        let (mut game, mut bots) = setup(2, 3, GameConfig::default(), &config).unwrap();
        let outcome = play_game(&mut game, &mut bots, 2).unwrap();
        assert!(outcome.turns <= 3);
        assert!(outcome.commands > 0);
        if !outcome.finished {
            assert_eq!(outcome.winner, None);
        }
    }
}
