//! Duel bookkeeping and session routing.
//!
//! The [`DuelRegistry`] is the server's index over running duels. It owns
//! no duel state; each duel lives in its own scheduler task, and the
//! registry keeps only the [`DuelHandle`] plus a session-to-seat routing
//! table so transport events carrying nothing but a session id land on the
//! right duel and player. When a scheduler finishes, its wrapper task
//! retires the duel and every session routed to it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use codeduel_core::executor::{Language, StrategyExecutor};
use codeduel_core::scheduler::{DuelHandle, EventSink, TickScheduler};
use codeduel_core::state::{DuelId, DuelState, Grid, PlayerId, PlayerSeat, SessionId};
use codeduel_core::EngineError;

/// Where a session's commands are routed.
#[derive(Debug, Clone)]
struct Route {
    duel: DuelId,
    player: PlayerId,
}

#[derive(Default)]
struct Inner {
    duels: HashMap<DuelId, DuelHandle>,
    sessions: HashMap<SessionId, Route>,
}

/// Index over running duels, shared across the server.
pub struct DuelRegistry {
    executor: Arc<StrategyExecutor>,
    next_duel: AtomicU64,
    inner: Mutex<Inner>,
}

impl DuelRegistry {
    /// Creates an empty registry with a shared executor.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            executor: Arc::new(StrategyExecutor::new()),
            next_duel: AtomicU64::new(1),
            inner: Mutex::new(Inner::default()),
        })
    }

    /// Creates a duel for `seats`, spawns its scheduler task, and routes
    /// each seat's session to it.
    ///
    /// The duel starts ticking immediately; players join with empty code
    /// and sit out ticks until their first submission arrives.
    ///
    /// # Errors
    ///
    /// Propagates [`EngineError`] from duel construction (roster size,
    /// grid dimensions).
    pub fn create_duel(
        self: &Arc<Self>,
        seats: Vec<PlayerSeat>,
        grid: Grid,
        sink: Arc<dyn EventSink>,
    ) -> Result<DuelId, EngineError> {
        let duel_id = DuelId::new(self.next_duel.fetch_add(1, Ordering::Relaxed));
        let state = DuelState::new(duel_id, seats, grid)?;

        let routes: Vec<(SessionId, Route)> = state
            .players()
            .map(|p| {
                (
                    p.session.clone(),
                    Route {
                        duel: duel_id,
                        player: p.id,
                    },
                )
            })
            .collect();

        let (scheduler, handle) = TickScheduler::new(state, Arc::clone(&self.executor), sink);

        {
            let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            inner.duels.insert(duel_id, handle);
            for (session, route) in routes {
                inner.sessions.insert(session, route);
            }
        }

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            scheduler.run().await;
            registry.retire(duel_id);
        });

        tracing::info!(duel = %duel_id, "duel created");
        Ok(duel_id)
    }

    /// Routes a code submission from `session` to its duel.
    ///
    /// Returns false when the session is not routed anywhere or its duel
    /// has already gone away.
    pub fn submit_code(&self, session: &SessionId, code: String, language_tag: &str) -> bool {
        let Some((handle, player)) = self.route(session) else {
            tracing::debug!(%session, "code submission from unrouted session");
            return false;
        };
        handle.submit_code(player, code, Language::from_tag(language_tag))
    }

    /// Reports a dropped session to its duel and forgets the route.
    pub fn disconnect(&self, session: &SessionId) {
        let route = {
            let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            inner.sessions.remove(session)
        };
        let Some(route) = route else {
            return;
        };
        let handle = {
            let inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            inner.duels.get(&route.duel).cloned()
        };
        if let Some(handle) = handle {
            handle.disconnect(route.player);
        }
    }

    /// Number of duels currently running.
    #[must_use]
    pub fn duel_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .duels
            .len()
    }

    /// Returns true while `session` is routed to a running duel.
    #[must_use]
    pub fn is_routed(&self, session: &SessionId) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .sessions
            .contains_key(session)
    }

    fn route(&self, session: &SessionId) -> Option<(DuelHandle, PlayerId)> {
        let inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let route = inner.sessions.get(session)?;
        let handle = inner.duels.get(&route.duel)?.clone();
        Some((handle, route.player))
    }

    /// Drops a finished duel and every session routed to it.
    fn retire(&self, duel: DuelId) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.duels.remove(&duel);
        inner.sessions.retain(|_, route| route.duel != duel);
        tracing::info!(%duel, "duel retired");
    }
}

// =============================================================================
// Tests
// =============================================================================
