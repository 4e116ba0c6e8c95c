//! Whole games between bots

use legions_bot::{play_game, setup, BotConfig};
use legions_core::{CreatureKind as K, Game, GameConfig, MAX_HEIGHT};

fn fast_config() -> BotConfig {
    BotConfig::default().with_time_limit_ms(50)
}

/// Board invariants that must hold between commands
fn assert_consistent(game: &Game) {
    for legion in game.legions() {
        assert!(
            (1..=MAX_HEIGHT).contains(&legion.height()) || (game.turn == 1 && legion.height() == MAX_HEIGHT + 1),
            "{} is {} high",
            legion.marker,
            legion.height()
        );
    }
    if game.battle.is_none() {
        for kind in K::all() {
            let on_board = game
                .legions()
                .iter()
                .flat_map(|l| l.creatures.iter())
                .filter(|c| c.kind == kind)
                .count() as u16;
            assert_eq!(game.pool.number_in_play(kind), on_board, "{kind} in play");
        }
    }
}

#[test]
fn test_seeded_game_stays_consistent() {
    let (mut game, mut bots) = setup(2, 17, GameConfig::default(), &fast_config()).unwrap();
    let outcome = play_game(&mut game, &mut bots, 40).unwrap();
    assert_consistent(&game);
    assert!(outcome.commands > 0);
    assert!(outcome.turns > 1);
    if let Some(winner) = &outcome.winner {
        assert!(game.player(winner).unwrap().has_titan());
    }
}

#[test]
fn test_four_player_game_runs() {
    let (mut game, mut bots) = setup(4, 23, GameConfig::default(), &fast_config()).unwrap();
    let outcome = play_game(&mut game, &mut bots, 25).unwrap();
    assert_consistent(&game);
    assert_eq!(outcome.scores.len(), 4);
    let eliminated: usize = outcome.finish_order.iter().map(|g| g.len()).sum();
    assert!(eliminated <= 4);
}

#[test]
fn test_every_turn_keeps_invariants() {
    let (mut game, mut bots) = setup(3, 31, GameConfig::default(), &fast_config()).unwrap();
    for cap in 1..=15 {
        play_game(&mut game, &mut bots, cap).unwrap();
        assert_consistent(&game);
        if game.over {
            break;
        }
    }
}
