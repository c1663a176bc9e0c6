//! # Codeduel Core
//!
//! Tick-driven engine for programmable bot duels.
//!
//! Players submit small strategy programs (Lua, Python, or JavaScript);
//! the engine invokes them once per 100 ms tick against a read-only view
//! of the grid, validates the returned action, and resolves movement and
//! combat deterministically until one bot survives.
//!
//! ## Architecture
//!
//! Four layers, each feeding the next:
//!
//! - **State** ([`state`]): the canonical per-duel entity, owned solely by
//!   its scheduler
//! - **Executor** ([`executor`]): sandboxed, deadline-bounded strategy
//!   invocation that always yields a valid [`action::Action`]
//! - **Combat** ([`combat`]): pure, order-deterministic resolution of one
//!   tick's actions
//! - **Scheduler** ([`scheduler`]): the per-duel tick loop tying the
//!   layers together and publishing events through a sink
//!
//! ## Usage
//!
//! ```rust,ignore
//! use codeduel_core::scheduler::TickScheduler;
//!
//! let (scheduler, handle) = TickScheduler::new(state, executor, sink);
//! tokio::spawn(scheduler.run());
//! handle.submit_code(player, source, language);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod combat;
pub mod context;
pub mod error;
pub mod executor;
pub mod scheduler;
pub mod state;

// Re-exports for convenience
pub use action::{Action, ActionKind, Direction};
pub use context::GameContext;
pub use error::EngineError;
pub use executor::{Language, StrategyExecutor};
pub use scheduler::{DuelHandle, DuelOver, DuelOverReason, EventSink, TickScheduler};
pub use state::{DuelId, DuelState, DuelStatus, Grid, PlayerId, PlayerSeat, SessionId};

#[cfg(test)]
mod tests;
