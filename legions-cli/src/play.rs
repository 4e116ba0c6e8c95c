//! Play command - bot-vs-bot games on the local machine
//!
//! ## Architecture
//!
//! - run() - orchestration
//! - load_bot_config(), play_games(), report_results()
//! - play_one(), compute_statistics()

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;

use legions_bot::{play_game, setup, BotConfig, GameOutcome};
use legions_core::GameConfig;

// ============================================================================
// COMMAND ARGUMENTS
// ============================================================================

#[derive(Args)]
pub struct PlayArgs {
    /// Number of games to play
    #[arg(long, default_value = "1")]
    pub games: usize,

    /// Players per game (2-6)
    #[arg(long, default_value = "2")]
    pub players: usize,

    /// Base seed; game i uses seed + i
    #[arg(long)]
    pub seed: Option<u64>,

    /// Maneuver search budget per decision
    #[arg(long)]
    pub time_limit_ms: Option<u64>,

    /// Stop a game after this many turns
    #[arg(long, default_value = "200")]
    pub max_turns: u32,

    /// Bot configuration JSON file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

/// Result of one game, or why it could not finish
#[derive(Clone, Debug, Serialize)]
struct GameRecord {
    game_number: usize,
    seed: u64,
    #[serde(flatten)]
    outcome: Option<GameOutcome>,
    error: Option<String>,
}

/// Aggregated results
#[derive(Clone, Debug, Default, Serialize)]
struct PlayResults {
    games: Vec<GameRecord>,
    /// Wins per seat name, in seat order
    wins: Vec<(String, usize)>,
    unfinished: usize,
    errors: usize,
    avg_turns: f32,
}

// ============================================================================
// ORCHESTRATION
// ============================================================================

pub fn run(args: PlayArgs) -> Result<()> {
    if !(2..=6).contains(&args.players) {
        anyhow::bail!("--players must be between 2 and 6, got {}", args.players);
    }
    let bot_config = load_bot_config(&args)?;
    let base_seed = args.seed.unwrap_or(42);

    tracing::info!(
        "Playing {} games with {} bots (seed {}, {} ms per search)",
        args.games,
        args.players,
        base_seed,
        bot_config.time_limit_ms
    );

    let records = play_games(&args, &bot_config, base_seed);
    let results = compute_statistics(records, args.players);
    report_results(&results, args.json)
}

// ============================================================================
// PHASES
// ============================================================================

/// Read the bot config file if given, then apply flag overrides
fn load_bot_config(args: &PlayArgs) -> Result<BotConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read bot config: {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("Invalid bot config: {}", path.display()))?
        }
        None => BotConfig::default(),
    };
    if let Some(ms) = args.time_limit_ms {
        config = config.with_time_limit_ms(ms);
    }
    Ok(config)
}

/// Play every game on the rayon pool
fn play_games(args: &PlayArgs, bot_config: &BotConfig, base_seed: u64) -> Vec<GameRecord> {
    let pb = ProgressBar::new(args.games as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} games ({per_sec})")
    {
        pb.set_style(style.progress_chars("=>-"));
    }
    if args.json {
        pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let records: Vec<GameRecord> = (0..args.games)
        .into_par_iter()
        .map(|i| {
            let seed = base_seed.wrapping_add(i as u64);
            let record = play_one(i + 1, seed, args.players, args.max_turns, bot_config);
            pb.inc(1);
            record
        })
        .collect();

    pb.finish_and_clear();
    records
}

fn report_results(results: &PlayResults, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
    } else {
        print_text_results(results);
    }
    Ok(())
}

// ============================================================================
// STEPS
// ============================================================================

fn play_one(game_number: usize, seed: u64, players: usize, max_turns: u32, bot_config: &BotConfig) -> GameRecord {
    let result = setup(players, seed, GameConfig::default(), bot_config)
        .and_then(|(mut game, mut bots)| play_game(&mut game, &mut bots, max_turns));
    match result {
        Ok(outcome) => {
            tracing::debug!("Game {}: winner {:?} in {} turns", game_number, outcome.winner, outcome.turns);
            GameRecord {
                game_number,
                seed,
                outcome: Some(outcome),
                error: None,
            }
        }
        Err(e) => {
            tracing::warn!("Game {} (seed {}) failed: {}", game_number, seed, e);
            GameRecord {
                game_number,
                seed,
                outcome: None,
                error: Some(e.to_string()),
            }
        }
    }
}

fn compute_statistics(games: Vec<GameRecord>, players: usize) -> PlayResults {
    let mut wins: Vec<(String, usize)> = (1..=players).map(|i| (format!("bot{i}"), 0)).collect();
    let mut unfinished = 0;
    let mut errors = 0;
    let mut total_turns = 0;
    let mut played = 0;

    for record in &games {
        let Some(outcome) = &record.outcome else {
            errors += 1;
            continue;
        };
        played += 1;
        total_turns += outcome.turns;
        if !outcome.finished {
            unfinished += 1;
        }
        if let Some(winner) = &outcome.winner {
            if let Some(entry) = wins.iter_mut().find(|(name, _)| name == winner) {
                entry.1 += 1;
            }
        }
    }

    PlayResults {
        games,
        wins,
        unfinished,
        errors,
        avg_turns: if played == 0 {
            0.0
        } else {
            total_turns as f32 / played as f32
        },
    }
}

fn print_text_results(results: &PlayResults) {
    let total = results.games.len();

    println!("\n=== Results ===");
    println!("Total games: {}", total);
    for (name, wins) in &results.wins {
        let rate = if total > 0 { *wins as f32 / total as f32 * 100.0 } else { 0.0 };
        println!("{:<12} {} wins ({:.1}%)", name, wins, rate);
    }
    println!("Unfinished:  {}", results.unfinished);
    println!("Errors:      {}", results.errors);
    println!("Avg turns:   {:.1}", results.avg_turns);

    println!("\nGame details:");
    for game in &results.games {
        match (&game.outcome, &game.error) {
            (Some(outcome), _) => println!(
                "  Game {} (seed {}): {} in {} turns",
                game.game_number,
                game.seed,
                outcome.winner.as_deref().unwrap_or("no winner"),
                outcome.turns
            ),
            (None, Some(error)) => println!("  Game {} (seed {}): error: {}", game.game_number, game.seed, error),
            (None, None) => {}
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(winner: Option<&str>, turns: u32, finished: bool) -> GameOutcome {
        GameOutcome {
            winner: winner.map(str::to_string),
            finish_order: Vec::new(),
            turns,
            commands: 100,
            scores: Vec::new(),
            finished,
        }
    }

    fn record(n: usize, outcome: Option<GameOutcome>) -> GameRecord {
        GameRecord {
            game_number: n,
            seed: n as u64,
            error: outcome.is_none().then(|| "stuck".to_string()),
            outcome,
        }
    }

    #[test]
    fn test_compute_statistics_empty() {
        let results = compute_statistics(vec![], 2);
        assert_eq!(results.wins, vec![("bot1".to_string(), 0), ("bot2".to_string(), 0)]);
        assert_eq!(results.avg_turns, 0.0);
    }

    #[test]
    fn test_compute_statistics() {
        let games = vec![
            record(1, Some(outcome(Some("bot1"), 10, true))),
            record(2, Some(outcome(Some("bot2"), 20, true))),
            record(3, Some(outcome(None, 30, false))),
            record(4, None),
        ];
        let results = compute_statistics(games, 2);
        assert_eq!(results.wins[0].1, 1);
        assert_eq!(results.wins[1].1, 1);
        assert_eq!(results.unfinished, 1);
        assert_eq!(results.errors, 1);
        assert_eq!(results.avg_turns, 20.0);
    }

    #[test]
    fn test_flags_override_config_file() {
        let path = std::env::temp_dir().join("legions_play_test_config.json");
        std::fs::write(&path, r#"{"time_limit_ms": 900, "max_candidates": 5}"#).unwrap();
        let args = PlayArgs {
            games: 1,
            players: 2,
            seed: None,
            time_limit_ms: Some(100),
            max_turns: 10,
            config: Some(path.clone()),
            json: false,
        };
        let config = load_bot_config(&args).unwrap();
        assert_eq!(config.time_limit_ms, 100);
        assert_eq!(config.max_candidates, 5);
        std::fs::remove_file(path).ok();
    }
}
