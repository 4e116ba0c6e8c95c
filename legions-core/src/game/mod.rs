//! The authoritative game aggregate
//!
//! A `Game` owns its players (and through them every legion and creature),
//! the creature pool, the current engagement and battle, and the finish
//! order. Commands enter through [`Game::execute`]; each verb validates
//! completely, then emits actions that are applied through [`Game::update`],
//! the single mutation path shared with observers.

mod fight;
mod master;
mod outcome;
mod update;

use crate::action::{Action, Observer};
use crate::battle::{Battle, BattleField};
use crate::board::HexLabel;
use crate::command::Command;
use crate::error::{invariant, out_of_turn, GameError, Result};
use crate::legion::Legion;
use crate::movement::MoveContext;
use crate::phase::{BattlePhase, Phase};
use crate::player::Player;
use crate::pool::CreaturePool;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

// ============================================================================
// CONFIGURATION
// ============================================================================

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 6;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Seed for towers and dice; None draws from entropy
    pub seed: Option<u64>,
    pub max_battle_turns: u8,
    /// Points per acquirable Angel
    pub angel_every: u32,
    /// Points per acquirable Archangel
    pub archangel_every: u32,
    pub titan_teleport_score: u32,
    pub mulligans: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            seed: None,
            max_battle_turns: crate::battle::MAX_BATTLE_TURNS,
            angel_every: 100,
            archangel_every: 500,
            titan_teleport_score: 400,
            mulligans: true,
        }
    }
}

impl GameConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

// ============================================================================
// CORE TYPES
// ============================================================================

/// How far an engagement has got before the battle starts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngagementStage {
    /// The lordless defender chooses whether to flee
    Flee,
    /// The attacker chooses to fight (either side may concede)
    Fight,
    Battle,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    pub hex: HexLabel,
    pub attacker: String,
    pub defender: String,
    pub stage: EngagementStage,
}

/// Angels a winning legion may take
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acquisition {
    pub player: String,
    pub marker: String,
    pub angels: u8,
    /// Slots that may hold an Archangel instead of an Angel
    pub archangels: u8,
}

fn fresh_rng() -> ChaCha8Rng {
    ChaCha8Rng::from_entropy()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Game {
    pub name: String,
    pub config: GameConfig,
    /// Turn order once started
    pub players: Vec<Player>,
    pub active: usize,
    pub turn: u32,
    pub phase: Phase,
    pub started: bool,
    pub over: bool,
    pub pool: CreaturePool,
    pub engagement: Option<Engagement>,
    pub battle: Option<Battle>,
    pub acquisition: Option<Acquisition>,
    /// Best first; players tied in one elimination share an entry
    pub finish_order: Vec<Vec<String>>,
    pub history: Vec<Action>,
    #[serde(skip, default = "fresh_rng")]
    rng: ChaCha8Rng,
}

impl Game {
    pub fn new(name: &str, config: GameConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => fresh_rng(),
        };
        Self {
            name: name.to_string(),
            config,
            players: Vec::new(),
            active: 0,
            turn: 1,
            phase: Phase::Split,
            started: false,
            over: false,
            pool: CreaturePool::new(),
            engagement: None,
            battle: None,
            acquisition: None,
            finish_order: Vec::new(),
            history: Vec::new(),
            rng,
        }
    }

    pub fn add_player(&mut self, name: &str) -> Result<()> {
        if self.started {
            return out_of_turn("game already started");
        }
        if self.players.len() >= MAX_PLAYERS {
            return invariant(format!("game {} is full", self.name));
        }
        if self.player(name).is_some() {
            return invariant(format!("{name} already joined"));
        }
        self.players.push(Player::new(name));
        Ok(())
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name == name)
    }

    /// Direct access for setting up scenarios
    pub fn player_mut(&mut self, name: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.name == name)
    }

    pub fn active_player(&self) -> Option<&Player> {
        self.players.get(self.active)
    }

    pub fn living_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| !p.dead)
    }

    /// Every legion on the board
    pub fn legions(&self) -> Vec<&Legion> {
        self.players.iter().flat_map(|p| p.legions.values()).collect()
    }

    pub fn legion(&self, marker: &str) -> Option<&Legion> {
        self.players.iter().find_map(|p| p.legion(marker))
    }

    pub(crate) fn legion_mut(&mut self, marker: &str) -> Result<&mut Legion> {
        self.players
            .iter_mut()
            .find_map(|p| p.legion_mut(marker))
            .ok_or_else(|| GameError::InvariantViolation(format!("no legion {marker}")))
    }

    /// A legion the sender owns
    pub(crate) fn owned_legion(&self, player: &str, marker: &str) -> Result<&Legion> {
        match self.legion(marker) {
            Some(legion) if legion.owner == player => Ok(legion),
            Some(_) => out_of_turn(format!("{marker} does not belong to {player}")),
            None => invariant(format!("no legion {marker}")),
        }
    }

    pub(crate) fn player_entry(&mut self, name: &str) -> Result<&mut Player> {
        self.player_mut(name)
            .ok_or_else(|| GameError::InvariantViolation(format!("no player {name}")))
    }

    /// Legions in a hex, any owner
    pub fn legions_in(&self, hex: HexLabel) -> Vec<&Legion> {
        self.legions().into_iter().filter(|l| l.hex == hex).collect()
    }

    /// Hexes where the active player's legions meet enemies
    pub fn engagements(&self) -> Vec<HexLabel> {
        let Some(active) = self.active_player() else {
            return Vec::new();
        };
        let mut hexes: Vec<HexLabel> = active
            .legions
            .values()
            .map(|l| l.hex)
            .filter(|&hex| self.legions_in(hex).iter().any(|l| l.owner != active.name))
            .collect();
        hexes.sort_unstable();
        hexes.dedup();
        hexes
    }

    pub fn move_context(&self, player: &Player) -> MoveContext {
        MoveContext {
            roll: player.movement_roll,
            teleported: player.teleported,
            titan_teleport: player.score >= self.config.titan_teleport_score,
        }
    }

    /// Snapshot of the current battle
    pub fn battle_field(&self) -> Option<BattleField> {
        let battle = self.battle.as_ref()?;
        let attacker = self.legion(&battle.attacker)?;
        let defender = self.legion(&battle.defender)?;
        Some(BattleField::new(battle, attacker, defender))
    }

    /// The player whose input the game is waiting on
    pub fn decision_maker(&self) -> Option<&str> {
        if self.over || !self.started {
            return None;
        }
        if let Some(acquisition) = &self.acquisition {
            return Some(&acquisition.player);
        }
        if let Some(battle) = &self.battle {
            let side = match battle.phase {
                BattlePhase::Counterstrike => battle.active.other(),
                _ => battle.active,
            };
            return Some(battle.player(side));
        }
        if let Some(engagement) = &self.engagement {
            let marker = match engagement.stage {
                EngagementStage::Flee => &engagement.defender,
                EngagementStage::Fight | EngagementStage::Battle => &engagement.attacker,
            };
            return self.legion(marker).map(|l| l.owner.as_str());
        }
        self.active_player().map(|p| p.name.as_str())
    }

    /// Overwrite a player's movement roll, for scenario setup
    pub fn set_movement_roll(&mut self, player: &str, roll: u8) -> Result<()> {
        self.player_entry(player)?.movement_roll = roll;
        Ok(())
    }

    pub(crate) fn roll_die(&mut self) -> u8 {
        self.rng.gen_range(1..=6)
    }

    pub(crate) fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    // ========================================================================
    // COMMAND DISPATCH
    // ========================================================================

    /// Validate and apply a command from `player`, returning the actions
    /// it produced. A rejected command leaves the game untouched.
    pub fn execute(&mut self, player: &str, command: Command) -> Result<Vec<Action>> {
        if !self.started {
            return out_of_turn("game has not started");
        }
        if self.over {
            return out_of_turn("game is over");
        }
        if self.player(player).is_none() {
            return out_of_turn(format!("{player} is not in this game"));
        }
        let verb = command.verb();
        let mut out = Vec::new();
        let result = match command {
            Command::SplitLegion {
                parent,
                child,
                keep,
                split,
            } => self.split_legion(player, &parent, &child, keep, split, &mut out),
            Command::UndoSplit { parent, child } => self.undo_split(player, &parent, &child, &mut out),
            Command::DoneWithSplits => self.done_with_splits(player, &mut out),
            Command::TakeMulligan => self.take_mulligan(player, &mut out),
            Command::MoveLegion {
                marker,
                hex,
                entry_side,
                teleport,
                teleporting_lord,
            } => self.move_legion(player, &marker, hex, entry_side, teleport, teleporting_lord, &mut out),
            Command::UndoMoveLegion { marker } => self.undo_move_legion(player, &marker, &mut out),
            Command::DoneWithMoves => self.done_with_moves(player, &mut out),
            Command::ResolveEngagement { hex } => self.resolve_engagement(player, hex, &mut out),
            Command::Flee { marker } => self.flee(player, &marker, &mut out),
            Command::DoNotFlee { marker } => self.do_not_flee(player, &marker, &mut out),
            Command::Concede { marker } => self.concede(player, &marker, &mut out),
            Command::Fight { attacker, defender } => self.fight(player, &attacker, &defender, &mut out),
            Command::DoneWithEngagements => self.done_with_engagements(player, &mut out),
            Command::RecruitCreature {
                marker,
                creature,
                recruiters,
            } => self.recruit_creature(player, &marker, creature, recruiters, &mut out),
            Command::UndoRecruit { marker } => self.undo_recruit(player, &marker, &mut out),
            Command::DoneWithRecruits => self.done_with_recruits(player, &mut out),
            Command::SummonAngel {
                marker,
                donor,
                creature,
            } => self.summon_angel(player, &marker, &donor, creature, &mut out),
            Command::DoNotSummonAngel { marker } => self.do_not_summon_angel(player, &marker, &mut out),
            Command::AcquireAngels { marker, angels } => self.acquire_angels(player, &marker, angels, &mut out),
            Command::DoNotAcquireAngels { marker } => self.do_not_acquire_angels(player, &marker, &mut out),
            Command::DoneWithReinforcements => self.done_with_reinforcements(player, &mut out),
            Command::MoveCreature { creature, from, to } => {
                self.move_creature(player, creature, from.as_deref(), &to, &mut out)
            }
            Command::UndoMoveCreature { creature, hex } => self.undo_move_creature(player, creature, &hex, &mut out),
            Command::DoneWithManeuvers => self.done_with_maneuvers(player, &mut out),
            Command::Strike { striker, target } => self.strike(player, &striker, &target, &mut out),
            Command::Carry { target } => self.carry(player, &target, &mut out),
            Command::DoneWithStrikes => self.done_with_strikes(player, &mut out),
            Command::DoneWithCounterstrikes => self.done_with_counterstrikes(player, &mut out),
        };
        match result {
            Ok(()) => Ok(out),
            Err(err) => {
                tracing::debug!("{} rejected {} from {}: {}", self.name, verb, player, err);
                Err(err)
            }
        }
    }

    /// Apply an action and record it in the output
    pub(crate) fn emit(&mut self, out: &mut Vec<Action>, action: Action) -> Result<()> {
        self.update(&action)?;
        out.push(action);
        Ok(())
    }

    // ========================================================================
    // PRECONDITIONS
    // ========================================================================

    /// The sender is the active player and the game is in `phase`
    pub(crate) fn require_phase(&self, player: &str, phase: Phase) -> Result<()> {
        let active = self.active_player().map(|p| p.name.as_str());
        if active != Some(player) {
            return out_of_turn(format!("{player} is not the active player"));
        }
        if self.phase != phase {
            return out_of_turn(format!("not the {phase} phase"));
        }
        Ok(())
    }

    /// Nothing nested is in progress: no engagement, battle or acquisition
    pub(crate) fn require_idle(&self) -> Result<()> {
        if self.acquisition.is_some() {
            return out_of_turn("an angel acquisition is pending");
        }
        if self.engagement.is_some() || self.battle.is_some() {
            return out_of_turn("an engagement is in progress");
        }
        Ok(())
    }

    /// A phase-advance verb sent again after the phase already advanced
    pub(crate) fn already_done(&self, player: &str, phase: Phase) -> bool {
        let Some(active) = self.active_player() else {
            return false;
        };
        if active.name == player {
            return self.phase > phase;
        }
        // Off turn, anything up to the last phase they finished is a resend
        self.player(player)
            .and_then(|p| p.last_done)
            .is_some_and(|(_, done)| done >= phase)
    }

    /// Next living player after the active one, and the turn they play in
    pub(crate) fn next_player_and_turn(&self) -> Option<(String, u32)> {
        let n = self.players.len();
        (1..=n)
            .map(|i| (self.active + i) % n)
            .find(|&i| !self.players[i].dead)
            .map(|i| {
                let turn = if i <= self.active { self.turn + 1 } else { self.turn };
                (self.players[i].name.clone(), turn)
            })
    }
}

impl Observer for Game {
    fn update(&mut self, action: &Action) {
        if let Err(err) = Game::update(self, action) {
            tracing::warn!("{} could not apply {:?}: {}", self.name, action, err);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    pub(super) fn two_player_game(seed: u64) -> Game {
        let mut game = Game::new("g1", GameConfig::default().with_seed(seed));
        game.add_player("p0").unwrap();
        game.add_player("p1").unwrap();
        game.start().unwrap();
        game
    }

    #[test]
    fn test_add_player_rules() {
        let mut game = Game::new("g1", GameConfig::default());
        game.add_player("p0").unwrap();
        assert!(game.add_player("p0").is_err());
        for i in 1..MAX_PLAYERS {
            game.add_player(&format!("p{i}")).unwrap();
        }
        assert!(game.add_player("late").is_err());
    }

    #[test]
    fn test_start_needs_two_players() {
        let mut game = Game::new("g1", GameConfig::default());
        game.add_player("p0").unwrap();
        assert!(game.start().is_err());
        assert!(!game.started);
    }

    #[test]
    fn test_start() {
        let game = two_player_game(7);
        assert!(game.started);
        assert_eq!(game.phase, Phase::Split);
        assert_eq!(game.turn, 1);
        for player in &game.players {
            assert_eq!(player.legions.len(), 1);
            let legion = player.legions.values().next().unwrap();
            assert_eq!(legion.height(), 8);
            assert_eq!(Some(legion.hex), player.starting_tower);
            assert_eq!(player.markers.len(), 11);
        }
        let towers: Vec<_> = game.players.iter().map(|p| p.starting_tower).collect();
        assert!(towers[0] < towers[1]);
        assert_eq!(game.pool.num_left(crate::creature::CreatureKind::TITAN), 4);
        assert_eq!(game.decision_maker(), Some(game.players[0].name.as_str()));
    }

    #[test]
    fn test_commands_before_start_rejected() {
        let mut game = Game::new("g1", GameConfig::default());
        game.add_player("p0").unwrap();
        let err = game.execute("p0", Command::DoneWithSplits).unwrap_err();
        assert!(matches!(err, GameError::OutOfTurn(_)));
    }

    #[test]
    fn test_out_of_turn() {
        let mut game = two_player_game(1);
        let second = game.players[1].name.clone();
        let err = game.execute(&second, Command::DoneWithSplits).unwrap_err();
        assert!(matches!(err, GameError::OutOfTurn(_)));
        let err = game.execute("nobody", Command::DoneWithSplits).unwrap_err();
        assert!(matches!(err, GameError::OutOfTurn(_)));
    }

    #[test]
    fn test_seeded_games_match() {
        let a = two_player_game(99);
        let b = two_player_game(99);
        let towers = |g: &Game| g.players.iter().map(|p| p.starting_tower).collect::<Vec<_>>();
        assert_eq!(towers(&a), towers(&b));
        assert_eq!(a.history, b.history);
    }

    #[test]
    fn test_mirror_replays_history() {
        let game = two_player_game(3);
        let mut mirror = Game::new("g1", GameConfig::default());
        mirror.add_player("p0").unwrap();
        mirror.add_player("p1").unwrap();
        for action in &game.history {
            Observer::update(&mut mirror, action);
        }
        assert_eq!(mirror.players, game.players);
        assert_eq!(mirror.pool, game.pool);
    }
}
