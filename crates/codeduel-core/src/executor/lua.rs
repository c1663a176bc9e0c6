//! In-process Lua backend.
//!
//! Each invocation builds a throwaway `mlua::Lua` state on a blocking
//! worker thread, loads the submission, calls its `bot_strategy(context)`
//! entry point, and converts the returned table through `serde_json` into
//! the shared action schema. The state is dropped when the call returns,
//! so nothing a submission defines survives into the next invocation.
//!
//! Deadline enforcement is two-layered. The async side races the worker
//! against `tokio::time::timeout` and reports [`ExecError::Timeout`] the
//! moment the budget lapses. The abandoned worker is then reaped from the
//! inside: an instruction-count hook raises a Lua error after a fixed
//! budget, and a memory limit bounds allocation, so a `while true do end`
//! submission cannot pin a blocking thread forever.

use std::time::Duration;

use async_trait::async_trait;
use mlua::{HookTriggers, Lua, LuaSerdeExt};

use crate::action::{self, Action};
use crate::context::GameContext;

use super::{ExecError, StrategyBackend};

/// Global function a Lua submission must define.
pub const ENTRY_POINT: &str = "bot_strategy";

/// Instructions an abandoned worker may retire before the hook kills it.
const INSTRUCTION_BUDGET: u32 = 2_000_000;

/// Heap ceiling for one evaluation state.
const MEMORY_LIMIT: usize = 64 << 20;

/// Backend evaluating submissions in an embedded Lua 5.4 interpreter.
#[derive(Debug, Default)]
pub struct LuaBackend;

impl LuaBackend {
    /// Creates the backend. Stateless; all state is per-invocation.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StrategyBackend for LuaBackend {
    async fn run(
        &self,
        code: &str,
        context: &GameContext,
        deadline: Duration,
    ) -> Result<Action, ExecError> {
        let code = code.to_owned();
        let context = context.clone();
        let worker = tokio::task::spawn_blocking(move || evaluate(&code, &context));

        match tokio::time::timeout(deadline, worker).await {
            // Worker still running: abandon it. The instruction hook
            // terminates it shortly after, off the hot path.
            Err(_elapsed) => Err(ExecError::Timeout(deadline)),
            Ok(Err(_join)) => Err(ExecError::Aborted),
            Ok(Ok(result)) => result,
        }
    }
}

/// Synchronous single-invocation evaluation in a fresh Lua state.
fn evaluate(code: &str, context: &GameContext) -> Result<Action, ExecError> {
    let lua = Lua::new();
    let _ = lua.set_memory_limit(MEMORY_LIMIT);
    lua.set_hook(
        HookTriggers::new().every_nth_instruction(INSTRUCTION_BUDGET),
        |_lua, _debug| Err(mlua::Error::RuntimeError("instruction budget exhausted".into())),
    );

    let value = call_entry_point(&lua, code, context).map_err(script_error)?;
    let json: serde_json::Value = lua.from_value(value).map_err(|_| ExecError::InvalidAction)?;
    action::validate(json).ok_or(ExecError::InvalidAction)
}

fn call_entry_point(lua: &Lua, code: &str, context: &GameContext) -> mlua::Result<mlua::Value> {
    lua.load(code).set_name("strategy").exec()?;
    let entry: mlua::Function = lua.globals().get(ENTRY_POINT)?;
    let table = lua.to_value(context)?;
    let value: mlua::Value = entry.call(table)?;
    Ok(value)
}

fn script_error(error: mlua::Error) -> ExecError {
    ExecError::Script(error.to_string())
}

// =============================================================================
// Tests
// =============================================================================
