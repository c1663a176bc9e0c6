//! Test module for engine-level integration tests.
//!
//! Unit tests live next to the code they cover; this module holds the
//! cross-cutting suites:
//!
//! - `integration.rs`: full duels driven tick by tick through the
//!   scheduler, strategies and all
//! - `isolation.rs`: concurrent duels and sandbox separation
//! - `helpers.rs`: duel factories, canned strategies, and a recording
//!   event sink

mod helpers;
mod isolation;

pub use helpers::*;
