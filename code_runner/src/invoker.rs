//! Function Invoker
//!
//! Calls one top-level function of a previously executed script. Only the
//! mock state is reset; the [`Session`] keeps every binding the script made,
//! including values its functions close over.

use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use util::execution_config::ExecutionLimits;

use crate::error::SandboxError;
use crate::mock_state::MockState;
use crate::result::{FunctionInvocationResult, aggregate_invocation};
use crate::session::Session;

/// Invokes `name` with `args` spread positionally.
pub fn run_function(
    mocks: &mut MockState,
    limits: &ExecutionLimits,
    session: &mut Session,
    name: &str,
    args: &[JsonValue],
) -> FunctionInvocationResult {
    mocks.reset();

    let outcome = session.call(name, args, limits, mocks);
    match &outcome {
        Err(SandboxError::NotFound(_)) => {
            debug!(function = name, "requested function is not defined");
        }
        Err(err @ SandboxError::Timeout(_)) => {
            warn!(function = name, "invocation aborted: {err}");
        }
        _ => {}
    }

    aggregate_invocation(mocks, outcome)
}

/// True when `name` is a fragment function declaring exactly `arity`
/// parameters (defaults and rest parameters excluded, as `fn.length`).
pub fn has_function_with_signature(session: &Session, name: &str, arity: usize) -> bool {
    session.globals.is_fragment(name) && session.arity(name) == Some(arity)
}
