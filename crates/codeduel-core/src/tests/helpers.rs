//! Shared fixtures for the integration suites.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::executor::StrategyExecutor;
use crate::scheduler::{DuelHandle, DuelOver, EventSink, TickScheduler};
use crate::state::{DuelId, DuelState, Grid, PlayerSeat, SessionId, StateSnapshot};

/// Walks toward the opponent and attacks once adjacent.
pub const HUNTER: &str = r#"
    function bot_strategy(context)
        local me = context.myBot.position
        local foe = context.opponent.position
        local dx = foe.x - me.x
        local dy = foe.y - me.y
        if math.abs(dx) + math.abs(dy) == 1 then
            if dx == 1 then return { kind = "attack", direction = "right" } end
            if dx == -1 then return { kind = "attack", direction = "left" } end
            if dy == 1 then return { kind = "attack", direction = "down" } end
            return { kind = "attack", direction = "up" }
        end
        if dx > 1 then return { kind = "move", direction = "right" } end
        if dx < -1 then return { kind = "move", direction = "left" } end
        if dy > 0 then return { kind = "move", direction = "down" } end
        return { kind = "move", direction = "up" }
    end
"#;

/// Stands still forever.
pub const PACIFIST: &str = r#"
    function bot_strategy(context)
        return { kind = "none", direction = "up" }
    end
"#;

/// Raises on every invocation.
pub const CRASHER: &str = r#"
    function bot_strategy(context)
        error("always broken")
    end
"#;

/// Event sink that records everything it is handed.
#[derive(Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<StateSnapshot>>,
    outcomes: Mutex<Vec<DuelOver>>,
}

impl RecordingSink {
    pub fn updates(&self) -> Vec<StateSnapshot> {
        self.updates.lock().unwrap().clone()
    }

    pub fn outcomes(&self) -> Vec<DuelOver> {
        self.outcomes.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn on_state_update(&self, snapshot: StateSnapshot) {
        self.updates.lock().unwrap().push(snapshot);
    }

    fn on_duel_over(&self, outcome: DuelOver) {
        self.outcomes.lock().unwrap().push(outcome);
    }
}

/// Builds a two-player duel on the classic 10x10 grid.
pub fn two_player_duel(id: u64) -> DuelState {
    let seats = vec![
        PlayerSeat::new(SessionId::new(format!("sock-{id}-a")), "alice"),
        PlayerSeat::new(SessionId::new(format!("sock-{id}-b")), "bob"),
    ];
    DuelState::new(DuelId::new(id), seats, Grid::new(10, 10)).unwrap()
}

/// Wires a scheduler around `state` with a fast test tick.
pub fn test_scheduler(state: DuelState) -> (TickScheduler, DuelHandle, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let (scheduler, handle) = TickScheduler::with_period(
        state,
        Arc::new(StrategyExecutor::new()),
        Arc::clone(&sink) as Arc<dyn EventSink>,
        Duration::from_millis(10),
    );
    (scheduler, handle, sink)
}
