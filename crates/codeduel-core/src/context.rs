//! Read-only snapshots handed to strategy programs.
//!
//! A [`GameContext`] is built once per living player per tick, from the
//! start-of-tick duel state, and passed to the executor **by value**. The
//! strategy gets no reference into engine memory and no channel back other
//! than its returned action.
//!
//! The serialized form is camelCase to match what strategy programs consume:
//!
//! ```json
//! {
//!   "myBot":    {"position": {"x": 1, "y": 5}, "health": 100, "facing": "right"},
//!   "opponent": {"position": {"x": 8, "y": 5}, "health": 100},
//!   "opponents": [ ... ],
//!   "grid":     {"width": 10, "height": 10}
//! }
//! ```
//!
//! `opponent` is the nearest living opponent and exists for backward
//! compatibility with single-opponent strategies; `opponents` lists every
//! living opponent in roster order. Obstacle data is never included.

use serde::{Deserialize, Serialize};

use crate::action::Direction;
use crate::error::EngineError;
use crate::state::{DuelState, PlayerId, Position};

/// What a strategy sees of its own bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnBotView {
    /// Current cell.
    pub position: Position,
    /// Current health.
    pub health: u32,
    /// Direction of the last committed move.
    pub facing: Direction,
}

/// What a strategy sees of an opponent's bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpponentView {
    /// Current cell.
    pub position: Position,
    /// Current health.
    pub health: u32,
}

/// What a strategy sees of the playing field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridView {
    /// Number of columns.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
}

/// The full read-only snapshot for one strategy invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameContext {
    /// The invoking player's bot.
    pub my_bot: OwnBotView,
    /// Nearest living opponent, for single-opponent consumers.
    pub opponent: OpponentView,
    /// All living opponents in roster order.
    pub opponents: Vec<OpponentView>,
    /// Grid dimensions.
    pub grid: GridView,
}

impl GameContext {
    /// Builds the snapshot for `player` from the current duel state.
    ///
    /// # Errors
    ///
    /// [`EngineError::MissingPlayer`] if `player` is not in the roster, and
    /// [`EngineError::NoLivingOpponent`] if every opponent is already dead.
    /// Both are engine-internal invariant violations: the scheduler only
    /// builds contexts while at least two bots are alive.
    pub fn for_player(state: &DuelState, player: PlayerId) -> Result<Self, EngineError> {
        let me = state.player(player)?;

        let opponents: Vec<OpponentView> = state
            .players()
            .filter(|p| p.id != player && p.bot.is_alive())
            .map(|p| OpponentView {
                position: p.bot.position,
                health: p.bot.health,
            })
            .collect();

        let nearest = opponents
            .iter()
            .min_by_key(|o| manhattan(me.bot.position, o.position))
            .cloned()
            .ok_or(EngineError::NoLivingOpponent {
                duel: state.id(),
                player,
            })?;

        Ok(Self {
            my_bot: OwnBotView {
                position: me.bot.position,
                health: me.bot.health,
                facing: me.bot.facing,
            },
            opponent: nearest,
            opponents,
            grid: GridView {
                width: state.grid().width,
                height: state.grid().height,
            },
        })
    }
}

fn manhattan(a: Position, b: Position) -> u32 {
    a.x.abs_diff(b.x) + a.y.abs_diff(b.y)
}
