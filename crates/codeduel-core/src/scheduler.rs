//! The per-duel tick loop.
//!
//! Each duel runs on its own [`TickScheduler`], a task that owns the
//! [`DuelState`] outright and multiplexes two inputs with `select!`: a
//! fixed-period ticker and a command channel fed by the transport layer
//! through a [`DuelHandle`]. Nothing else ever touches the state, so duels
//! cannot observe or corrupt one another.
//!
//! One tick is four steps. First, a read-only [`GameContext`] is built for
//! every living player holding code, all from the same start-of-tick state,
//! so every strategy this tick sees the same world. Second, those contexts
//! are fanned out to the executor concurrently and the gathered actions are
//! sorted by roster id, erasing completion-order nondeterminism. Third,
//! combat resolves the sorted batch sequentially. Fourth, the duel either
//! concludes (one bot left standing, or none) or the new snapshot is
//! broadcast and the counter advances.
//!
//! Commands mutate state between ticks: a code submission takes effect at
//! the next tick's snapshot construction, and a disconnect fells the
//! leaver's bot immediately. The terminal notification fires exactly once
//! per duel, on whichever path gets there first.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use crate::action::Action;
use crate::combat;
use crate::context::GameContext;
use crate::error::EngineError;
use crate::executor::{Language, StrategyExecutor};
use crate::state::{DuelId, DuelState, DuelStatus, PlayerId, StateSnapshot};

/// Wall-clock period between ticks.
pub const TICK_PERIOD: Duration = Duration::from_millis(100);

// =============================================================================
// Commands and events
// =============================================================================

/// Transport-layer requests routed to one duel's scheduler.
#[derive(Debug)]
pub enum DuelCommand {
    /// Replace a player's strategy. Takes effect at the next tick.
    SubmitCode {
        /// The submitting player.
        player: PlayerId,
        /// Strategy source.
        code: String,
        /// Declared language of `code`.
        language: Language,
    },
    /// A player's transport session dropped.
    Disconnect {
        /// The departed player.
        player: PlayerId,
    },
}

/// Why a duel ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuelOverReason {
    /// Exactly one bot survived combat.
    Elimination,
    /// No bot survived.
    Draw,
    /// A disconnect left a single player standing.
    OpponentDisconnected,
    /// An internal invariant broke; the duel was aborted without a winner.
    EngineFault,
}

/// Terminal notification, emitted exactly once per duel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuelOver {
    /// The concluded duel.
    pub duel: DuelId,
    /// The winner, absent for draws and faults.
    pub winner: Option<PlayerId>,
    /// How it ended.
    pub reason: DuelOverReason,
}

/// Where the scheduler publishes its observable events.
///
/// The transport layer implements this to forward snapshots and outcomes
/// to connected clients. Implementations must not block.
pub trait EventSink: Send + Sync {
    /// A tick resolved and the duel continues.
    fn on_state_update(&self, snapshot: StateSnapshot);

    /// The duel concluded. Called exactly once, after the final snapshot
    /// has been delivered through [`EventSink::on_state_update`].
    fn on_duel_over(&self, outcome: DuelOver);
}

// =============================================================================
// Handle
// =============================================================================

/// Cheap cloneable front door to a running duel.
///
/// Sends are fire-and-forget; both methods report whether the scheduler
/// was still alive to receive the command.
#[derive(Debug, Clone)]
pub struct DuelHandle {
    duel: DuelId,
    commands: mpsc::UnboundedSender<DuelCommand>,
}

impl DuelHandle {
    /// The duel this handle addresses.
    #[must_use]
    pub const fn duel(&self) -> DuelId {
        self.duel
    }

    /// Submits replacement strategy source for `player`.
    pub fn submit_code(&self, player: PlayerId, code: String, language: Language) -> bool {
        self.commands
            .send(DuelCommand::SubmitCode {
                player,
                code,
                language,
            })
            .is_ok()
    }

    /// Reports that `player`'s transport session dropped.
    pub fn disconnect(&self, player: PlayerId) -> bool {
        self.commands.send(DuelCommand::Disconnect { player }).is_ok()
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// Owns one duel's state and drives its tick loop to conclusion.
pub struct TickScheduler {
    state: DuelState,
    executor: Arc<StrategyExecutor>,
    sink: Arc<dyn EventSink>,
    commands: mpsc::UnboundedReceiver<DuelCommand>,
    period: Duration,
}

impl TickScheduler {
    /// Creates a scheduler ticking at [`TICK_PERIOD`].
    pub fn new(
        state: DuelState,
        executor: Arc<StrategyExecutor>,
        sink: Arc<dyn EventSink>,
    ) -> (Self, DuelHandle) {
        Self::with_period(state, executor, sink, TICK_PERIOD)
    }

    /// Creates a scheduler with a custom tick period (tests shrink it).
    pub fn with_period(
        state: DuelState,
        executor: Arc<StrategyExecutor>,
        sink: Arc<dyn EventSink>,
        period: Duration,
    ) -> (Self, DuelHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = DuelHandle {
            duel: state.id(),
            commands: tx,
        };
        let scheduler = Self {
            state,
            executor,
            sink,
            commands: rx,
            period,
        };
        (scheduler, handle)
    }

    /// Drives the duel to conclusion, consuming the scheduler.
    ///
    /// Starts the duel, broadcasts the initial snapshot, then alternates
    /// between timed ticks and command handling until a terminal outcome is
    /// reached or every handle is dropped (which tears the duel down
    /// silently).
    pub async fn run(mut self) {
        self.state.begin();
        self.sink.on_state_update(self.state.snapshot());

        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // An interval's first tick completes immediately; the first real
        // tick should land one full period after start.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(outcome) = self.step().await {
                        tracing::info!(
                            duel = %outcome.duel,
                            winner = ?outcome.winner,
                            reason = ?outcome.reason,
                            "duel concluded"
                        );
                        break;
                    }
                }
                command = self.commands.recv() => {
                    match command {
                        Some(command) => {
                            if let Some(outcome) = self.apply_command(command) {
                                tracing::info!(
                                    duel = %outcome.duel,
                                    winner = ?outcome.winner,
                                    reason = ?outcome.reason,
                                    "duel concluded"
                                );
                                break;
                            }
                        }
                        None => {
                            tracing::debug!(
                                duel = %self.state.id(),
                                "all handles dropped; tearing duel down"
                            );
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Resolves one tick. Public so tests can drive the loop by hand.
    ///
    /// Returns the terminal outcome once the duel concludes; `None` while
    /// it continues (or after it has already concluded).
    pub async fn step(&mut self) -> Option<DuelOver> {
        if self.state.status() != DuelStatus::Running {
            return None;
        }

        let actions = match self.gather_actions().await {
            Ok(actions) => actions,
            Err(error) => {
                tracing::error!(duel = %self.state.id(), %error, "tick failed; aborting duel");
                return self.conclude(None, DuelOverReason::EngineFault);
            }
        };

        combat::resolve_tick(&mut self.state, &actions);

        match *self.state.alive_players().as_slice() {
            [] => self.conclude(None, DuelOverReason::Draw),
            [winner] => self.conclude(Some(winner), DuelOverReason::Elimination),
            _ => {
                // The broadcast carries the tick it resolved; the counter
                // advances afterwards. A terminal tick never advances.
                self.sink.on_state_update(self.state.snapshot());
                self.state.advance_tick();
                None
            }
        }
    }

    /// Fans the tick's strategy invocations out to the executor and gathers
    /// the results in roster order.
    ///
    /// Every context is built from the same pre-resolution state. Players
    /// without code sit the tick out.
    async fn gather_actions(&self) -> Result<Vec<(PlayerId, Action)>, EngineError> {
        let mut invocations = JoinSet::new();
        for player in self.state.players() {
            if !player.bot.is_alive() || player.code.is_empty() {
                continue;
            }
            let context = GameContext::for_player(&self.state, player.id)?;
            let executor = Arc::clone(&self.executor);
            let code = player.code.clone();
            let language = player.language;
            let id = player.id;
            invocations
                .spawn(async move { (id, executor.run(&code, language, &context).await) });
        }

        let mut actions = Vec::new();
        while let Some(joined) = invocations.join_next().await {
            match joined {
                Ok(action) => actions.push(action),
                // A lost invocation is indistinguishable from a `none`
                // action; the duel keeps going.
                Err(join_error) => {
                    tracing::error!(duel = %self.state.id(), %join_error, "invocation task lost");
                }
            }
        }
        actions.sort_by_key(|&(id, _)| id);
        Ok(actions)
    }

    fn apply_command(&mut self, command: DuelCommand) -> Option<DuelOver> {
        match command {
            DuelCommand::SubmitCode {
                player,
                code,
                language,
            } => {
                if let Err(error) = self.state.submit_code(player, code, language) {
                    tracing::warn!(duel = %self.state.id(), %error, "ignoring code submission");
                }
                None
            }
            DuelCommand::Disconnect { player } => self.handle_disconnect(player),
        }
    }

    /// Fells the leaver's bot. If that leaves a single player standing the
    /// duel concludes in their favor; with more survivors it keeps ticking.
    fn handle_disconnect(&mut self, player: PlayerId) -> Option<DuelOver> {
        match self.state.player_mut(player) {
            Ok(entry) => entry.bot.health = 0,
            Err(error) => {
                tracing::warn!(duel = %self.state.id(), %error, "ignoring disconnect");
                return None;
            }
        }
        tracing::info!(duel = %self.state.id(), %player, "player disconnected");

        match *self.state.alive_players().as_slice() {
            [] => self.conclude(None, DuelOverReason::Draw),
            [winner] => self.conclude(Some(winner), DuelOverReason::OpponentDisconnected),
            _ => {
                self.sink.on_state_update(self.state.snapshot());
                None
            }
        }
    }

    /// Transitions to `Finished` and emits the terminal pair: final
    /// snapshot, then the one-and-only `DuelOver`.
    fn conclude(&mut self, winner: Option<PlayerId>, reason: DuelOverReason) -> Option<DuelOver> {
        if !self.state.finish(winner) {
            return None;
        }
        let outcome = DuelOver {
            duel: self.state.id(),
            winner,
            reason,
        };
        self.sink.on_state_update(self.state.snapshot());
        self.sink.on_duel_over(outcome.clone());
        Some(outcome)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Grid, PlayerSeat, Position, SessionId};
    use std::sync::Mutex;

    const MOVE_RIGHT: &str = r#"
        function bot_strategy(context)
            return { kind = "move", direction = "right" }
        end
    "#;

    const ATTACK_RIGHT: &str = r#"
        function bot_strategy(context)
            return { kind = "attack", direction = "right" }
        end
    "#;

    #[derive(Default)]
    struct RecordingSink {
        updates: Mutex<Vec<StateSnapshot>>,
        outcomes: Mutex<Vec<DuelOver>>,
    }

    impl EventSink for RecordingSink {
        fn on_state_update(&self, snapshot: StateSnapshot) {
            self.updates.lock().unwrap().push(snapshot);
        }

        fn on_duel_over(&self, outcome: DuelOver) {
            self.outcomes.lock().unwrap().push(outcome);
        }
    }

    fn scheduler() -> (TickScheduler, DuelHandle, Arc<RecordingSink>) {
        let seats = vec![
            PlayerSeat::new(SessionId::new("a"), "alice"),
            PlayerSeat::new(SessionId::new("b"), "bob"),
        ];
        let state = DuelState::new(DuelId::new(1), seats, Grid::new(10, 10)).unwrap();
        let sink = Arc::new(RecordingSink::default());
        let (scheduler, handle) = TickScheduler::with_period(
            state,
            Arc::new(StrategyExecutor::new()),
            Arc::clone(&sink) as Arc<dyn EventSink>,
            Duration::from_millis(10),
        );
        (scheduler, handle, sink)
    }

    #[tokio::test]
    async fn idle_tick_broadcasts_and_advances() {
        let (mut scheduler, _handle, sink) = scheduler();
        scheduler.state.begin();

        assert!(scheduler.step().await.is_none());
        assert!(scheduler.step().await.is_none());

        // Each broadcast carries the tick it resolved; the counter only
        // advances once the snapshot is out.
        let updates = sink.updates.lock().unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].tick, 0);
        assert_eq!(updates[1].tick, 1);
        assert_eq!(scheduler.state.tick(), 2);
        assert!(sink.outcomes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn submitted_code_drives_the_next_tick() {
        let (mut scheduler, _handle, _sink) = scheduler();
        scheduler.state.begin();
        scheduler.apply_command(DuelCommand::SubmitCode {
            player: PlayerId::new(0),
            code: MOVE_RIGHT.into(),
            language: Language::Lua,
        });

        scheduler.step().await;

        let mover = scheduler.state.player(PlayerId::new(0)).unwrap();
        assert_eq!(mover.bot.position, Position::new(2, 5));
        // Player 1 sat the tick out.
        let idler = scheduler.state.player(PlayerId::new(1)).unwrap();
        assert_eq!(idler.bot.position, Position::new(8, 5));
    }

    #[tokio::test]
    async fn elimination_concludes_with_the_survivor() {
        let (mut scheduler, _handle, sink) = scheduler();
        scheduler.state.begin();
        scheduler
            .state
            .player_mut(PlayerId::new(0))
            .unwrap()
            .bot
            .position = Position::new(7, 5);
        scheduler
            .state
            .player_mut(PlayerId::new(1))
            .unwrap()
            .bot
            .health = crate::combat::ATTACK_DAMAGE;
        scheduler
            .state
            .submit_code(PlayerId::new(0), ATTACK_RIGHT.into(), Language::Lua)
            .unwrap();

        let outcome = scheduler.step().await.expect("duel should conclude");
        assert_eq!(outcome.winner, Some(PlayerId::new(0)));
        assert_eq!(outcome.reason, DuelOverReason::Elimination);

        let outcomes = sink.outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1, "terminal notification fires once");
        let updates = sink.updates.lock().unwrap();
        let last = updates.last().unwrap();
        assert_eq!(last.status, DuelStatus::Finished);
        assert_eq!(last.winner, Some(PlayerId::new(0)));
    }

    #[tokio::test]
    async fn concluded_duels_do_not_step_again() {
        let (mut scheduler, _handle, sink) = scheduler();
        scheduler.state.begin();
        scheduler
            .state
            .player_mut(PlayerId::new(1))
            .unwrap()
            .bot
            .health = 0;

        assert!(scheduler.step().await.is_some());
        assert!(scheduler.step().await.is_none());
        assert_eq!(sink.outcomes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn no_survivors_is_a_draw() {
        let (mut scheduler, _handle, _sink) = scheduler();
        scheduler.state.begin();
        for id in [0, 1] {
            scheduler
                .state
                .player_mut(PlayerId::new(id))
                .unwrap()
                .bot
                .health = 0;
        }

        let outcome = scheduler.step().await.expect("duel should conclude");
        assert_eq!(outcome.winner, None);
        assert_eq!(outcome.reason, DuelOverReason::Draw);
    }

    #[tokio::test]
    async fn disconnect_awards_the_remaining_player() {
        let (mut scheduler, _handle, sink) = scheduler();
        scheduler.state.begin();

        let outcome = scheduler
            .apply_command(DuelCommand::Disconnect {
                player: PlayerId::new(0),
            })
            .expect("duel should conclude");
        assert_eq!(outcome.winner, Some(PlayerId::new(1)));
        assert_eq!(outcome.reason, DuelOverReason::OpponentDisconnected);
        assert_eq!(sink.outcomes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn disconnect_with_multiple_survivors_continues() {
        let seats = vec![
            PlayerSeat::new(SessionId::new("a"), "alice"),
            PlayerSeat::new(SessionId::new("b"), "bob"),
            PlayerSeat::new(SessionId::new("c"), "carol"),
        ];
        let state = DuelState::new(DuelId::new(2), seats, Grid::new(10, 10)).unwrap();
        let sink = Arc::new(RecordingSink::default());
        let (mut scheduler, _handle) = TickScheduler::with_period(
            state,
            Arc::new(StrategyExecutor::new()),
            Arc::clone(&sink) as Arc<dyn EventSink>,
            Duration::from_millis(10),
        );
        scheduler.state.begin();

        let outcome = scheduler.apply_command(DuelCommand::Disconnect {
            player: PlayerId::new(2),
        });
        assert!(outcome.is_none());
        assert!(sink.outcomes.lock().unwrap().is_empty());
        assert!(!scheduler
            .state
            .player(PlayerId::new(2))
            .unwrap()
            .bot
            .is_alive());
    }

    #[tokio::test]
    async fn unknown_player_commands_are_ignored() {
        let (mut scheduler, _handle, sink) = scheduler();
        scheduler.state.begin();

        assert!(scheduler
            .apply_command(DuelCommand::Disconnect {
                player: PlayerId::new(9),
            })
            .is_none());
        assert!(scheduler
            .apply_command(DuelCommand::SubmitCode {
                player: PlayerId::new(9),
                code: MOVE_RIGHT.into(),
                language: Language::Lua,
            })
            .is_none());
        assert!(sink.outcomes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_loop_is_driven_by_handle_commands() {
        let (scheduler, handle, sink) = scheduler();
        let task = tokio::spawn(scheduler.run());

        // Give the loop a moment to broadcast the initial snapshot.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.disconnect(PlayerId::new(1)));

        task.await.unwrap();
        let outcomes = sink.outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].winner, Some(PlayerId::new(0)));
        assert_eq!(outcomes[0].reason, DuelOverReason::OpponentDisconnected);
        assert!(!sink.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dropping_every_handle_stops_the_loop() {
        let (scheduler, handle, sink) = scheduler();
        let task = tokio::spawn(scheduler.run());
        drop(handle);

        task.await.unwrap();
        assert!(sink.outcomes.lock().unwrap().is_empty(), "silent teardown");
    }
}
