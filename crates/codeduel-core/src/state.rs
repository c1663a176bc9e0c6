//! Duel state: grid, roster, bots, status, tick counter.
//!
//! `DuelState` is the canonical per-duel entity. It owns its players and
//! their bots outright; nothing outside the duel's own scheduler ever holds
//! a mutable reference to it, which is what keeps duels isolated from each
//! other.
//!
//! # Roster order
//!
//! Players are stored in a `BTreeMap` keyed by [`PlayerId`]. Ids are
//! assigned densely in arrival order at duel creation, so map iteration
//! order *is* arrival order. That ordering is used for exactly one thing:
//! deterministic combat resolution within a tick.
//!
//! # Example
//!
//! ```
//! use codeduel_core::state::{DuelId, DuelState, DuelStatus, Grid, PlayerSeat, SessionId};
//!
//! let seats = vec![
//!     PlayerSeat::new(SessionId::new("sock-a"), "alice"),
//!     PlayerSeat::new(SessionId::new("sock-b"), "bob"),
//! ];
//! let duel = DuelState::new(DuelId::new(1), seats, Grid::new(10, 10)).unwrap();
//!
//! assert_eq!(duel.status(), DuelStatus::Waiting);
//! assert_eq!(duel.tick(), 0);
//! assert_eq!(duel.players().count(), 2);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::action::Direction;
use crate::error::EngineError;
use crate::executor::Language;

/// Health every bot starts (and maxes out) at.
pub const STARTING_HEALTH: u32 = 100;

// =============================================================================
// Identifiers
// =============================================================================

/// Unique identifier for a duel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DuelId(u64);

impl DuelId {
    /// Creates a duel id from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DuelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a player within one duel.
///
/// Assigned densely (0, 1, 2, ...) in arrival order when the duel is
/// created, so the natural `Ord` on ids reproduces roster order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(u64);

impl PlayerId {
    /// Creates a player id from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque transport-session identifier, owned by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a session id from the transport's identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Grid and positions
// =============================================================================

/// An integer cell position. Valid iff `0 <= x < width` and `0 <= y < height`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Column, growing rightward.
    pub x: i32,
    /// Row, growing downward.
    pub y: i32,
}

impl Position {
    /// Creates a position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns the position one cell away in `direction`.
    ///
    /// The result may be out of bounds; callers check against the grid.
    #[must_use]
    pub const fn stepped(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// The duel's playing field.
///
/// `obstacles` is carried for forward compatibility with the wire format
/// but is always empty in this design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    /// Number of columns.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
    /// Blocked cells. Always empty.
    pub obstacles: Vec<Position>,
}

impl Grid {
    /// Minimum side length that keeps the four-seat spawn layout in
    /// bounds and distinct (on a 4x4 grid seats 1 and 3 would collide on
    /// the center cell).
    pub const MIN_SIDE: u32 = 5;

    /// Creates a grid with no obstacles.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            obstacles: Vec::new(),
        }
    }

    /// Returns true if `position` lies within `[0,width) x [0,height)`.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn contains(&self, position: Position) -> bool {
        position.x >= 0
            && position.x < self.width as i32
            && position.y >= 0
            && position.y < self.height as i32
    }

    /// Returns the spawn positions for the first `count` seats.
    ///
    /// Seats are placed mid-left, mid-right, mid-top, mid-bottom in that
    /// order; on a 10x10 grid the first two land at (1,5) and (8,5).
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn spawn_points(&self, count: usize) -> Vec<Position> {
        let w = self.width as i32;
        let h = self.height as i32;
        let layout = [
            Position::new(1, h / 2),
            Position::new(w - 2, h / 2),
            Position::new(w / 2, 1),
            Position::new(w / 2, h - 2),
        ];
        layout.into_iter().take(count).collect()
    }
}

// =============================================================================
// Bot
// =============================================================================

/// One player's piece on the grid.
///
/// A bot is owned exclusively by one [`Player`] within one [`DuelState`]
/// and is destroyed with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bot {
    /// Current cell. Always within the grid.
    pub position: Position,
    /// Current health, clamped to `[0, max_health]`.
    pub health: u32,
    /// Health ceiling.
    pub max_health: u32,
    /// Direction of the last committed move.
    pub facing: Direction,
}

impl Bot {
    /// Creates a bot at `position` with full health, facing right.
    #[must_use]
    pub const fn new(position: Position) -> Self {
        Self {
            position,
            health: STARTING_HEALTH,
            max_health: STARTING_HEALTH,
            facing: Direction::Right,
        }
    }

    /// Reduces health by `amount`, floored at zero.
    pub fn take_damage(&mut self, amount: u32) {
        self.health = self.health.saturating_sub(amount);
    }

    /// Returns true while health is above zero.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.health > 0
    }
}

// =============================================================================
// Player
// =============================================================================

/// A seat request handed to [`DuelState::new`] by the matchmaker.
#[derive(Debug, Clone)]
pub struct PlayerSeat {
    /// Transport-session identifier for the seat.
    pub session: SessionId,
    /// Display name.
    pub name: String,
}

impl PlayerSeat {
    /// Creates a seat.
    pub fn new(session: SessionId, name: impl Into<String>) -> Self {
        Self {
            session,
            name: name.into(),
        }
    }
}

/// One participant in a duel.
#[derive(Debug, Clone)]
pub struct Player {
    /// Roster id within the duel.
    pub id: PlayerId,
    /// Transport-session identifier.
    pub session: SessionId,
    /// Display name.
    pub name: String,
    /// The player's piece.
    pub bot: Bot,
    /// Current strategy source. Empty until first submission; a player with
    /// empty code simply sits out the tick.
    pub code: String,
    /// Declared language of `code`.
    pub language: Language,
}

// =============================================================================
// Duel state
// =============================================================================

/// Lifecycle of a duel. `Finished` is terminal and entered at most once.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuelStatus {
    /// Created, not yet started.
    Waiting,
    /// Ticking.
    Running,
    /// Over. `winner` is meaningful now.
    Finished,
}

/// The canonical per-duel entity.
#[derive(Debug, Clone)]
pub struct DuelState {
    id: DuelId,
    players: BTreeMap<PlayerId, Player>,
    grid: Grid,
    status: DuelStatus,
    winner: Option<PlayerId>,
    tick: u64,
}

impl DuelState {
    /// Creates a duel in the `Waiting` state with bots on their spawn points.
    ///
    /// # Errors
    ///
    /// [`EngineError::BadRosterSize`] unless 2-4 seats are supplied;
    /// [`EngineError::GridTooSmall`] below the 5x5 minimum.
    pub fn new(id: DuelId, seats: Vec<PlayerSeat>, grid: Grid) -> Result<Self, EngineError> {
        if grid.width < Grid::MIN_SIDE || grid.height < Grid::MIN_SIDE {
            return Err(EngineError::GridTooSmall {
                width: grid.width,
                height: grid.height,
            });
        }
        if seats.len() < 2 || seats.len() > 4 {
            return Err(EngineError::BadRosterSize {
                duel: id,
                count: seats.len(),
            });
        }

        let spawns = grid.spawn_points(seats.len());
        let players = seats
            .into_iter()
            .zip(spawns)
            .enumerate()
            .map(|(index, (seat, spawn))| {
                let player_id = PlayerId::new(index as u64);
                let player = Player {
                    id: player_id,
                    session: seat.session,
                    name: seat.name,
                    bot: Bot::new(spawn),
                    code: String::new(),
                    language: Language::Lua,
                };
                (player_id, player)
            })
            .collect();

        Ok(Self {
            id,
            players,
            grid,
            status: DuelStatus::Waiting,
            winner: None,
            tick: 0,
        })
    }

    /// The duel's id.
    #[must_use]
    pub const fn id(&self) -> DuelId {
        self.id
    }

    /// The playing field.
    #[must_use]
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn status(&self) -> DuelStatus {
        self.status
    }

    /// The winning player, set iff the duel is finished and was won.
    #[must_use]
    pub const fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    /// The tick counter. Starts at 0, strictly increases while running.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Iterates players in roster (arrival) order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Looks up a player.
    ///
    /// # Errors
    ///
    /// [`EngineError::MissingPlayer`] if the id is not in the roster.
    pub fn player(&self, id: PlayerId) -> Result<&Player, EngineError> {
        self.players.get(&id).ok_or(EngineError::MissingPlayer {
            duel: self.id,
            player: id,
        })
    }

    /// Mutable player lookup.
    ///
    /// # Errors
    ///
    /// [`EngineError::MissingPlayer`] if the id is not in the roster.
    pub fn player_mut(&mut self, id: PlayerId) -> Result<&mut Player, EngineError> {
        let duel = self.id;
        self.players
            .get_mut(&id)
            .ok_or(EngineError::MissingPlayer { duel, player: id })
    }

    /// Ids of all players whose bots are alive, in roster order.
    #[must_use]
    pub fn alive_players(&self) -> Vec<PlayerId> {
        self.players
            .values()
            .filter(|p| p.bot.is_alive())
            .map(|p| p.id)
            .collect()
    }

    /// Replaces a player's strategy source and declared language.
    ///
    /// This is the fire-and-forget mutation from the transport layer; it is
    /// read at the start of the next tick's snapshot construction.
    ///
    /// # Errors
    ///
    /// [`EngineError::MissingPlayer`] if the id is not in the roster.
    pub fn submit_code(
        &mut self,
        id: PlayerId,
        code: String,
        language: Language,
    ) -> Result<(), EngineError> {
        let player = self.player_mut(id)?;
        player.code = code;
        player.language = language;
        Ok(())
    }

    /// Transitions `Waiting -> Running`. No-op if already past waiting.
    pub fn begin(&mut self) {
        if self.status == DuelStatus::Waiting {
            self.status = DuelStatus::Running;
        }
    }

    /// Transitions to `Finished` with the given winner.
    ///
    /// Returns true on the first call; later calls do nothing and return
    /// false, which is what guarantees the terminal notification fires
    /// exactly once.
    pub fn finish(&mut self, winner: Option<PlayerId>) -> bool {
        if self.status == DuelStatus::Finished {
            return false;
        }
        self.status = DuelStatus::Finished;
        self.winner = winner;
        true
    }

    /// Advances the tick counter by one.
    pub fn advance_tick(&mut self) {
        self.tick += 1;
    }

    /// Builds the serializable snapshot broadcast after each tick.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            id: self.id,
            players: self
                .players
                .values()
                .map(|p| PlayerSnapshot {
                    id: p.id,
                    name: p.name.clone(),
                    bot: p.bot.clone(),
                })
                .collect(),
            grid: self.grid.clone(),
            status: self.status,
            winner: self.winner,
            tick: self.tick,
        }
    }
}

// =============================================================================
// Snapshots
// =============================================================================

/// Public view of one player inside a [`StateSnapshot`].
///
/// Strategy source is deliberately not included; the snapshot goes to every
/// participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Roster id.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// The player's bot.
    pub bot: Bot,
}

/// The serialized duel state broadcast to the transport layer each tick.
///
/// Players appear as an array in roster order, matching the shape
/// single-opponent-era clients already consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Duel id.
    pub id: DuelId,
    /// Players in roster order.
    pub players: Vec<PlayerSnapshot>,
    /// The playing field.
    pub grid: Grid,
    /// Lifecycle state.
    pub status: DuelStatus,
    /// Winner, if finished and won.
    pub winner: Option<PlayerId>,
    /// Tick the snapshot was taken at.
    pub tick: u64,
}

// =============================================================================
// Tests
// =============================================================================
