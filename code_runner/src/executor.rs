//! Script Executor
//!
//! Runs a whole fragment on a fresh [`Session`] under the configured limits.
//! Failures of any kind come back as an unsuccessful [`ExecutionResult`]
//! carrying whatever output the fragment produced before it stopped.

use std::time::Instant;

use tracing::{debug, warn};
use util::execution_config::ExecutionLimits;

use crate::engine::ScriptRun;
use crate::error::SandboxError;
use crate::mock_state::MockState;
use crate::result::{ExecutionResult, aggregate_script};
use crate::session::Session;

/// Resets `mocks`, queues `responses` and runs `code` to completion.
pub fn run_script<I, S>(
    mocks: &mut MockState,
    limits: &ExecutionLimits,
    code: &str,
    responses: I,
) -> (ExecutionResult, Session)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    mocks.reset();
    mocks.load_responses(responses);
    let started = Instant::now();

    let (run, session) = match Session::start(limits) {
        Ok(mut session) => (session.run(code, limits, mocks), session),
        Err(err) => (ScriptRun::failed(err), Session::empty()),
    };
    let ScriptRun {
        outcome,
        globals,
        context,
    } = run;

    match &outcome {
        Err(SandboxError::Compile { line, message }) => {
            debug!(line, "fragment failed to compile: {message}");
        }
        Err(err @ SandboxError::Timeout(_)) => {
            warn!(timeout_ms = limits.timeout_ms, "script aborted: {err}");
        }
        _ => {}
    }

    let result = aggregate_script(mocks, globals.observed(), context, outcome);
    debug!(
        success = result.success,
        lines = result.all_output.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "script run finished"
    );
    (result, session)
}
