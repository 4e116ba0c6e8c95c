//! Legions Core - rules engine
//!
//! This crate provides the authoritative game logic:
//! - Creature reference data and the creature pool (caretaker)
//! - Master board and battle map topology
//! - Legions, players and the turn/phase state machine
//! - Move legality for master and battle boards
//! - Battles, strikes and carries
//! - Commands in, actions out, with `Game::update` as the single mutation path

pub mod action;
pub mod battle;
pub mod battlemap;
pub mod board;
pub mod command;
pub mod creature;
pub mod error;
pub mod game;
pub mod legion;
pub mod movement;
pub mod phase;
pub mod player;
pub mod pool;
pub mod recruit;

// Re-exports for convenient access
pub use action::{Action, Observer, Seat};
pub use battle::{expected_hits, Battle, BattleField, Fighter, MAX_BATTLE_TURNS, REINFORCE_TURN};
pub use battlemap::{BattleHexId, BattleMap, BattleSide, Hazard, Hexside};
pub use board::{terrain_of, HexLabel, Terrain, TOWERS};
pub use command::Command;
pub use creature::{Creature, CreatureKind};
pub use error::{GameError, Result};
pub use game::{Acquisition, Engagement, EngagementStage, Game, GameConfig};
pub use legion::{Legion, MAX_HEIGHT};
pub use movement::{
    can_move_legion, find_all_moves, find_battle_moves, find_normal_moves, find_teleport_moves, EntrySide,
    MasterMove, MoveContext, MoveRequest,
};
pub use phase::{BattlePhase, Phase};
pub use player::{Color, Player};
pub use pool::CreaturePool;
