//! Queue-based matchmaking.
//!
//! Players queue for a party size (2 to 4); the moment a queue fills, its
//! seats drain into a fresh duel through the [`DuelRegistry`]. Queues are
//! keyed by party size, so a player waiting for a 2-duel never gets pulled
//! into a 4-duel. A session sits in at most one queue; re-enqueueing moves
//! it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context};
use codeduel_core::scheduler::EventSink;
use codeduel_core::state::{DuelId, Grid, PlayerSeat, SessionId};

use crate::registry::DuelRegistry;

/// Smallest party a queue accepts.
pub const MIN_PARTY: usize = 2;
/// Largest party a queue accepts.
pub const MAX_PARTY: usize = 4;

/// Matchmaker pairing queued sessions into duels.
pub struct Matchmaking {
    registry: Arc<DuelRegistry>,
    sink: Arc<dyn EventSink>,
    grid: Grid,
    queues: Mutex<HashMap<usize, Vec<PlayerSeat>>>,
}

impl Matchmaking {
    /// Creates a matchmaker producing duels on `grid`, publishing their
    /// events to `sink`.
    pub fn new(registry: Arc<DuelRegistry>, sink: Arc<dyn EventSink>, grid: Grid) -> Self {
        Self {
            registry,
            sink,
            grid,
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Queues `seat` for a duel of `party_size` players.
    ///
    /// Returns the new duel's id when this seat filled the queue, `None`
    /// while the seat is still waiting.
    ///
    /// # Errors
    ///
    /// Rejects party sizes outside 2-4 and propagates duel-creation
    /// failures. On failure the drained seats are not re-queued; their
    /// sessions are expected to retry.
    pub fn enqueue(&self, seat: PlayerSeat, party_size: usize) -> anyhow::Result<Option<DuelId>> {
        if !(MIN_PARTY..=MAX_PARTY).contains(&party_size) {
            bail!("party size {party_size} is outside {MIN_PARTY}-{MAX_PARTY}");
        }

        let party = {
            let mut queues = self.queues.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            // One queue slot per session, across all party sizes.
            for queue in queues.values_mut() {
                queue.retain(|waiting| waiting.session != seat.session);
            }
            let queue = queues.entry(party_size).or_default();
            queue.push(seat);
            if queue.len() < party_size {
                return Ok(None);
            }
            std::mem::take(queue)
        };

        let duel = self
            .registry
            .create_duel(party, self.grid.clone(), Arc::clone(&self.sink))
            .context("creating duel from filled queue")?;
        Ok(Some(duel))
    }

    /// Removes `session` from whichever queue it waits in, if any.
    ///
    /// Returns true if the session was waiting.
    pub fn remove(&self, session: &SessionId) -> bool {
        let mut queues = self.queues.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut removed = false;
        for queue in queues.values_mut() {
            let before = queue.len();
            queue.retain(|waiting| &waiting.session != session);
            removed |= queue.len() != before;
        }
        removed
    }

    /// Number of sessions waiting across all queues.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.queues
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }
}

// =============================================================================
// Tests
// =============================================================================
