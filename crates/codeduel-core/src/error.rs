//! Engine-internal error taxonomy.
//!
//! These are programming or configuration errors in the engine itself, not
//! strategy failures (those degrade to the fallback action inside the
//! executor and never surface here). An `EngineError` is fatal to the duel
//! it occurred in, never to the process.

use thiserror::Error;

use crate::state::{DuelId, PlayerId};

/// Errors raised by duel construction and snapshot building.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A duel needs between two and four players.
    #[error("duel {duel} requires 2-4 players, got {count}")]
    BadRosterSize {
        /// The duel being constructed.
        duel: DuelId,
        /// Number of seats supplied.
        count: usize,
    },

    /// The grid is too small to place the spawn layout.
    #[error("grid {width}x{height} is below the 5x5 minimum")]
    GridTooSmall {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// A player id was looked up that is not in the roster.
    #[error("player {player} is not in duel {duel}")]
    MissingPlayer {
        /// The duel that was queried.
        duel: DuelId,
        /// The unknown player id.
        player: PlayerId,
    },

    /// A context snapshot was requested for a player with no living opponent.
    #[error("player {player} in duel {duel} has no living opponent")]
    NoLivingOpponent {
        /// The duel that was queried.
        duel: DuelId,
        /// The player whose snapshot was being built.
        player: PlayerId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_duel() {
        let err = EngineError::MissingPlayer {
            duel: DuelId::new(7),
            player: PlayerId::new(2),
        };
        let text = err.to_string();
        assert!(text.contains('7'));
        assert!(text.contains('2'));
    }
}
