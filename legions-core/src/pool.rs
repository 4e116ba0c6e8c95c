//! Creature pool (the caretaker)
//!
//! Global bookkeeping of how many creatures of each type are still in the
//! bank, how many are dead, and by subtraction how many are in play.

use crate::creature::{CreatureKind, NUM_CREATURE_TYPES};
use crate::error::{GameError, Result};
use serde::{Deserialize, Serialize};

/// Per-type bank and graveyard counts
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreaturePool {
    remaining: [u16; NUM_CREATURE_TYPES],
    graveyard: [u16; NUM_CREATURE_TYPES],
}

impl CreaturePool {
    /// A full bank with an empty graveyard
    pub fn new() -> Self {
        let mut remaining = [0; NUM_CREATURE_TYPES];
        for kind in CreatureKind::all() {
            remaining[kind.index()] = kind.data().max_count;
        }
        Self {
            remaining,
            graveyard: [0; NUM_CREATURE_TYPES],
        }
    }

    /// Number still available to recruit or summon
    pub fn num_left(&self, kind: CreatureKind) -> u16 {
        self.remaining[kind.index()]
    }

    /// Number permanently removed from the game
    pub fn num_dead(&self, kind: CreatureKind) -> u16 {
        self.graveyard[kind.index()]
    }

    pub fn number_in_play(&self, kind: CreatureKind) -> u16 {
        kind.data()
            .max_count
            .saturating_sub(self.num_left(kind))
            .saturating_sub(self.num_dead(kind))
    }

    /// Take one creature out of the bank
    pub fn take_one(&mut self, kind: CreatureKind) -> Result<()> {
        let left = &mut self.remaining[kind.index()];
        if *left == 0 {
            return Err(GameError::IllegalRecruit(format!("no {} left", kind)));
        }
        *left -= 1;
        Ok(())
    }

    /// Return a living creature to the bank
    pub fn put_one_back(&mut self, kind: CreatureKind) -> Result<()> {
        if self.number_in_play(kind) == 0 {
            return Err(GameError::InvariantViolation(format!(
                "no {} in play to put back",
                kind
            )));
        }
        self.remaining[kind.index()] += 1;
        Ok(())
    }

    /// Record a creature's death. Lords and demi-lords go back to the bank,
    /// everything else to the graveyard.
    pub fn kill_one(&mut self, kind: CreatureKind) -> Result<()> {
        if self.number_in_play(kind) == 0 {
            return Err(GameError::InvariantViolation(format!(
                "no {} in play to kill",
                kind
            )));
        }
        if kind.returns_to_pool_on_death() {
            self.remaining[kind.index()] += 1;
        } else {
            self.graveyard[kind.index()] += 1;
        }
        Ok(())
    }
}

impl Default for CreaturePool {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_balanced(pool: &CreaturePool) {
        for kind in CreatureKind::all() {
            assert_eq!(
                pool.num_left(kind) + pool.num_dead(kind) + pool.number_in_play(kind),
                kind.data().max_count,
                "{kind}"
            );
        }
    }

    #[test]
    fn test_initial_counts() {
        let pool = CreaturePool::new();
        assert_eq!(pool.num_left(CreatureKind::CENTAUR), 25);
        assert_eq!(pool.num_left(CreatureKind::TITAN), 6);
        assert_eq!(pool.num_left(CreatureKind::WYVERN), 18);
        assert_eq!(pool.num_left(CreatureKind::ANGEL), 18);
        assert_eq!(pool.number_in_play(CreatureKind::ANGEL), 0);
        assert_balanced(&pool);
    }

    #[test]
    fn test_take_one() {
        let mut pool = CreaturePool::new();
        pool.take_one(CreatureKind::CENTAUR).unwrap();
        assert_eq!(pool.num_left(CreatureKind::CENTAUR), 24);
        assert_eq!(pool.number_in_play(CreatureKind::CENTAUR), 1);
        pool.take_one(CreatureKind::TITAN).unwrap();
        assert_eq!(pool.num_left(CreatureKind::TITAN), 5);
        assert_balanced(&pool);
    }

    #[test]
    fn test_take_one_exhausted() {
        let mut pool = CreaturePool::new();
        for _ in 0..6 {
            pool.take_one(CreatureKind::WARLOCK).unwrap();
        }
        let err = pool.take_one(CreatureKind::WARLOCK).unwrap_err();
        assert!(matches!(err, GameError::IllegalRecruit(_)));
        assert_eq!(pool.num_left(CreatureKind::WARLOCK), 0);
    }

    #[test]
    fn test_put_one_back() {
        let mut pool = CreaturePool::new();
        pool.take_one(CreatureKind::WYVERN).unwrap();
        assert_eq!(pool.num_left(CreatureKind::WYVERN), 17);
        pool.put_one_back(CreatureKind::WYVERN).unwrap();
        assert_eq!(pool.num_left(CreatureKind::WYVERN), 18);
        assert!(pool.put_one_back(CreatureKind::WYVERN).is_err());
        assert_balanced(&pool);
    }

    #[test]
    fn test_kill_one() {
        let mut pool = CreaturePool::new();
        pool.take_one(CreatureKind::ANGEL).unwrap();
        pool.take_one(CreatureKind::CENTAUR).unwrap();
        assert_eq!(pool.num_left(CreatureKind::ANGEL), 17);

        pool.kill_one(CreatureKind::ANGEL).unwrap();
        assert_eq!(pool.num_left(CreatureKind::ANGEL), 18);
        assert_eq!(pool.num_dead(CreatureKind::ANGEL), 0);

        pool.kill_one(CreatureKind::CENTAUR).unwrap();
        assert_eq!(pool.num_left(CreatureKind::CENTAUR), 24);
        assert_eq!(pool.num_dead(CreatureKind::CENTAUR), 1);
        assert_eq!(pool.number_in_play(CreatureKind::CENTAUR), 0);
        assert_balanced(&pool);
    }

    #[test]
    fn test_balance_survives_mixed_sequence() {
        let mut pool = CreaturePool::new();
        let kinds = [CreatureKind::OGRE, CreatureKind::TROLL, CreatureKind::GUARDIAN];
        for round in 0..5 {
            for &kind in &kinds {
                pool.take_one(kind).unwrap();
                pool.take_one(kind).unwrap();
                if round % 2 == 0 {
                    pool.kill_one(kind).unwrap();
                } else {
                    pool.put_one_back(kind).unwrap();
                }
                assert_balanced(&pool);
            }
        }
        assert_eq!(pool.num_dead(CreatureKind::OGRE), 3);
        assert_eq!(pool.num_dead(CreatureKind::GUARDIAN), 0);
    }
}
