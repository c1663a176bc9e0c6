//! Out-of-process interpreter backend for Python and JavaScript.
//!
//! One invocation spawns one short-lived interpreter. The submission is
//! concatenated with a fixed driver stub and passed on the command line;
//! the context arrives as a single JSON document on stdin, and the driver
//! prints the strategy's return value as one JSON line on stdout. The
//! engine parses the **last** non-empty stdout line, so stray prints from
//! the submission do not corrupt the protocol.
//!
//! Containment is process-level: stdout is read through a hard byte cap,
//! stderr is discarded, and an invocation that outlives its deadline gets
//! a kill signal. `kill_on_drop` covers the paths where the child is
//! abandoned early.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};

use crate::action::{self, Action};
use crate::context::GameContext;

use super::{ExecError, StrategyBackend, MAX_OUTPUT_BYTES};

/// Driver appended to a Python submission. The submission must define a
/// top-level `bot_strategy(context)` function.
const PYTHON_DRIVER: &str = "\n\
import json as _duel_json\n\
import sys as _duel_sys\n\
_duel_context = _duel_json.load(_duel_sys.stdin)\n\
print(_duel_json.dumps(bot_strategy(_duel_context)))\n";

/// Driver appended to a JavaScript submission. The submission must define
/// a top-level `botStrategy(context)` function.
const JAVASCRIPT_DRIVER: &str = "\n\
const _duelContext = JSON.parse(require('fs').readFileSync(0, 'utf8'));\n\
console.log(JSON.stringify(botStrategy(_duelContext)));\n";

/// Backend that delegates one invocation to one ephemeral interpreter.
#[derive(Debug)]
pub struct ProcessBackend {
    interpreter: &'static str,
    source_flag: &'static str,
    driver: &'static str,
}

impl ProcessBackend {
    /// Backend running submissions under `python3 -c`.
    #[must_use]
    pub fn python() -> Self {
        Self {
            interpreter: "python3",
            source_flag: "-c",
            driver: PYTHON_DRIVER,
        }
    }

    /// Backend running submissions under `node -e`.
    #[must_use]
    pub fn javascript() -> Self {
        Self {
            interpreter: "node",
            source_flag: "-e",
            driver: JAVASCRIPT_DRIVER,
        }
    }
}

#[async_trait]
impl StrategyBackend for ProcessBackend {
    async fn run(
        &self,
        code: &str,
        context: &GameContext,
        deadline: Duration,
    ) -> Result<Action, ExecError> {
        let program = format!("{code}{}", self.driver);
        let input = serde_json::to_vec(context)
            .map_err(|e| ExecError::Script(format!("context encoding: {e}")))?;

        let mut child = Command::new(self.interpreter)
            .arg(self.source_flag)
            .arg(&program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        match tokio::time::timeout(deadline, exchange(&mut child, &input)).await {
            Err(_elapsed) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                Err(ExecError::Timeout(deadline))
            }
            Ok(outcome) => {
                let stdout = outcome?;
                parse_output(&stdout)
            }
        }
    }
}

/// Feeds the context in, drains stdout through the byte cap, and reaps the
/// child.
async fn exchange(child: &mut Child, input: &[u8]) -> Result<Vec<u8>, ExecError> {
    if let Some(mut stdin) = child.stdin.take() {
        // A submission that exits before reading stdin closes the pipe;
        // the resulting write error is its problem, not ours.
        let _ = stdin.write_all(input).await;
        let _ = stdin.shutdown().await;
    }

    let mut stdout = match child.stdout.take() {
        Some(stdout) => stdout,
        None => return Err(ExecError::Aborted),
    };
    let mut output = Vec::new();
    let cap = MAX_OUTPUT_BYTES as u64 + 1;
    (&mut stdout).take(cap).read_to_end(&mut output).await?;
    if output.len() > MAX_OUTPUT_BYTES {
        return Err(ExecError::OversizedOutput(MAX_OUTPUT_BYTES));
    }

    let status = child.wait().await?;
    if !status.success() {
        return Err(ExecError::Script(format!(
            "interpreter exited with {status}"
        )));
    }
    Ok(output)
}

/// Parses the last non-empty stdout line as the action document.
fn parse_output(stdout: &[u8]) -> Result<Action, ExecError> {
    let text = String::from_utf8_lossy(stdout);
    let line = text
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .ok_or(ExecError::InvalidAction)?;
    let value: serde_json::Value =
        serde_json::from_str(line.trim()).map_err(|_| ExecError::InvalidAction)?;
    action::validate(value).ok_or(ExecError::InvalidAction)
}

// =============================================================================
// Tests
// =============================================================================
