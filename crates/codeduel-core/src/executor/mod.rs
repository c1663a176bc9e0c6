//! Sandboxed, deadline-bounded execution of untrusted strategy programs.
//!
//! The [`StrategyExecutor`] is the only component that ever touches
//! player-submitted source. Its contract is deliberately blunt: given code,
//! a language tag, and a read-only [`GameContext`], it returns exactly one
//! validated [`Action`] within the deadline, **always**. It never raises to
//! the caller and never blocks past the deadline; every failure mode -
//! parse error, runtime error, timeout, invalid or missing return value,
//! oversized output, unsupported language - degrades to
//! [`Action::fallback`] with a `tracing` diagnostic.
//!
//! # Backends
//!
//! The language set is closed and each tag selects a backend honoring the
//! same [`StrategyBackend`] contract:
//!
//! - [`Language::Lua`] runs in-process in a fresh, disposable `mlua` state
//!   per invocation ([`lua::LuaBackend`]).
//! - [`Language::Python`] and [`Language::Javascript`] run out of process,
//!   one ephemeral interpreter per invocation
//!   ([`process::ProcessBackend`]).
//! - [`Language::Unknown`] (any unrecognized tag) resolves immediately to
//!   the fallback.
//!
//! Adding a language means adding one variant and one backend; the
//! scheduler never changes.
//!
//! # Isolation
//!
//! Every invocation gets a fresh evaluation environment, so global
//! definitions inside one submission can never leak into or collide with
//! another invocation - across players, across ticks, and across duels.
//! The context is handed in by value; the returned action is the only
//! channel back into the engine. A timed-out invocation is abandoned and
//! its eventual result, if any, is discarded.

pub mod lua;
pub mod process;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::Action;
use crate::context::GameContext;

pub use lua::LuaBackend;
pub use process::ProcessBackend;

/// Wall-clock budget for one strategy invocation.
pub const DEFAULT_DEADLINE: Duration = Duration::from_millis(100);

/// Cap on the textual output a process-based backend will read.
pub const MAX_OUTPUT_BYTES: usize = 8 * 1024;

// =============================================================================
// Language
// =============================================================================

/// The closed set of strategy languages.
///
/// Parsed from a lowercase tag; anything unrecognized maps to `Unknown`,
/// which is a first-class member of the set so a bogus tag submitted over
/// the wire degrades gracefully instead of being rejected upstream.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// In-process Lua evaluation.
    Lua,
    /// Out-of-process `python3` evaluation.
    Python,
    /// Out-of-process `node` evaluation.
    Javascript,
    /// Any unsupported tag. Always resolves to the fallback action.
    #[serde(other)]
    Unknown,
}

impl Language {
    /// Parses a language tag as submitted by the transport layer.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "lua" => Self::Lua,
            "python" => Self::Python,
            "javascript" => Self::Javascript,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lua => write!(f, "lua"),
            Self::Python => write!(f, "python"),
            Self::Javascript => write!(f, "javascript"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// =============================================================================
// Failure taxonomy
// =============================================================================

/// Why one strategy invocation failed.
///
/// These never escape the executor; they exist so the diagnostic log line
/// says what actually went wrong before the fallback action is substituted.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The program failed to parse or raised at runtime.
    #[error("strategy error: {0}")]
    Script(String),

    /// The invocation exceeded its wall-clock deadline and was abandoned.
    #[error("deadline of {0:?} exceeded")]
    Timeout(Duration),

    /// The returned value did not conform to the action schema.
    #[error("strategy returned an invalid action")]
    InvalidAction,

    /// A process backend produced more output than the fixed cap.
    #[error("strategy output exceeded {0} bytes")]
    OversizedOutput(usize),

    /// The declared language has no backend.
    #[error("unsupported language")]
    UnsupportedLanguage,

    /// Spawning or talking to an interpreter process failed.
    #[error("interpreter i/o: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking evaluation worker panicked or was cancelled.
    #[error("evaluation worker aborted")]
    Aborted,
}

// =============================================================================
// Backend contract
// =============================================================================

/// The contract every language backend honors.
///
/// One call runs one submission against one context snapshot inside a
/// fresh, isolated environment and resolves within `deadline`. Backends
/// return `ExecError` rather than panicking; the executor folds errors
/// into the fallback action.
#[async_trait]
pub trait StrategyBackend: Send + Sync {
    /// Evaluates `code` against `context`, bounded by `deadline`.
    async fn run(
        &self,
        code: &str,
        context: &GameContext,
        deadline: Duration,
    ) -> Result<Action, ExecError>;
}

// =============================================================================
// Executor
// =============================================================================

/// Polymorphic sandbox over the closed backend set.
#[derive(Debug)]
pub struct StrategyExecutor {
    deadline: Duration,
    lua: LuaBackend,
    python: ProcessBackend,
    javascript: ProcessBackend,
}

impl StrategyExecutor {
    /// Creates an executor with the default 100 ms deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::with_deadline(DEFAULT_DEADLINE)
    }

    /// Creates an executor with a custom deadline (tests tighten it).
    #[must_use]
    pub fn with_deadline(deadline: Duration) -> Self {
        Self {
            deadline,
            lua: LuaBackend::new(),
            python: ProcessBackend::python(),
            javascript: ProcessBackend::javascript(),
        }
    }

    /// The per-invocation wall-clock budget.
    #[must_use]
    pub const fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Runs one strategy invocation. Infallible by contract: any failure
    /// resolves to [`Action::fallback`] after a logged diagnostic.
    pub async fn run(&self, code: &str, language: Language, context: &GameContext) -> Action {
        let result = match language {
            Language::Lua => self.lua.run(code, context, self.deadline).await,
            Language::Python => self.python.run(code, context, self.deadline).await,
            Language::Javascript => self.javascript.run(code, context, self.deadline).await,
            Language::Unknown => Err(ExecError::UnsupportedLanguage),
        };

        match result {
            Ok(action) => action,
            Err(error) => {
                tracing::warn!(%language, %error, "strategy invocation failed; using fallback action");
                Action::fallback()
            }
        }
    }
}

impl Default for StrategyExecutor {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
