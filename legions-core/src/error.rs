//! Error taxonomy for rejected commands
//!
//! Every variant is produced before any state is touched, so a rejected
//! command leaves the game exactly as it was.

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GameError {
    /// Destination, entry side or battle move not in the legal set
    #[error("illegal move: {0}")]
    IllegalMove(String),

    /// Recruit not eligible or pool exhausted
    #[error("illegal recruit: {0}")]
    IllegalRecruit(String),

    /// Wrong player or wrong phase for this verb
    #[error("out of turn: {0}")]
    OutOfTurn(String),

    /// The command would break an entity invariant
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, GameError>;

/// Shorthand constructors used by the rules code
pub(crate) fn illegal_move<T>(msg: impl Into<String>) -> Result<T> {
    Err(GameError::IllegalMove(msg.into()))
}

pub(crate) fn illegal_recruit<T>(msg: impl Into<String>) -> Result<T> {
    Err(GameError::IllegalRecruit(msg.into()))
}

pub(crate) fn out_of_turn<T>(msg: impl Into<String>) -> Result<T> {
    Err(GameError::OutOfTurn(msg.into()))
}

pub(crate) fn invariant<T>(msg: impl Into<String>) -> Result<T> {
    Err(GameError::InvariantViolation(msg.into()))
}
