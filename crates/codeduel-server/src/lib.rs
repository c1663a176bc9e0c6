//! # Codeduel Server
//!
//! Server-side plumbing around the `codeduel-core` engine: the
//! [`registry::DuelRegistry`] that spawns and indexes duel schedulers, and
//! the [`matchmaking::Matchmaking`] queues that fill duels from waiting
//! sessions. A transport layer (or the bundled exhibition binary) sits on
//! top, feeding sessions in and consuming engine events.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod matchmaking;
pub mod registry;

pub use matchmaking::Matchmaking;
pub use registry::DuelRegistry;
