//! Result Aggregator
//!
//! Turns the mock state and observed identifiers of a finished run into an
//! owned, serializable record. Everything is copied out, so resetting the
//! [`MockState`] afterwards cannot change a record that was already returned.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::{ErrorKind, SandboxError};
use crate::mock_state::{CallCounts, Capability, MockState};

/// Identifiers the fragment declared and read at its top level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedIdentifiers {
    pub declared: BTreeSet<String>,
    pub accessed: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub console_output: Vec<String>,
    pub alert_output: Vec<String>,
    pub all_output: Vec<String>,
    pub call_counts: CallCounts,
    pub variables: ObservedIdentifiers,
    /// Final top-level bindings created by the fragment, as JSON.
    pub context: Map<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInvocationResult {
    pub success: bool,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub console_output: Vec<String>,
    pub alert_output: Vec<String>,
    pub all_output: Vec<String>,
    pub call_counts: CallCounts,
    /// `null` when the call failed or returned `undefined`.
    pub return_value: JsonValue,
}

fn split_outcome<T>(outcome: Result<T, SandboxError>) -> (Option<T>, Option<String>, Option<ErrorKind>) {
    match outcome {
        Ok(value) => (Some(value), None, None),
        Err(err) => (None, Some(err.to_string()), Some(err.kind())),
    }
}

pub(crate) fn aggregate_script(
    mocks: &MockState,
    variables: ObservedIdentifiers,
    context: Map<String, JsonValue>,
    outcome: Result<(), SandboxError>,
) -> ExecutionResult {
    let (done, error, error_kind) = split_outcome(outcome);
    ExecutionResult {
        success: done.is_some(),
        error,
        error_kind,
        console_output: mocks.console_output().to_vec(),
        alert_output: mocks.alert_output().to_vec(),
        all_output: mocks.all_output().to_vec(),
        call_counts: mocks.call_counts().clone(),
        variables,
        context,
    }
}

pub(crate) fn aggregate_invocation(
    mocks: &MockState,
    outcome: Result<JsonValue, SandboxError>,
) -> FunctionInvocationResult {
    let (returned, error, error_kind) = split_outcome(outcome);
    FunctionInvocationResult {
        success: returned.is_some(),
        error,
        error_kind,
        console_output: mocks.console_output().to_vec(),
        alert_output: mocks.alert_output().to_vec(),
        all_output: mocks.all_output().to_vec(),
        call_counts: mocks.call_counts().clone(),
        return_value: returned.unwrap_or(JsonValue::Null),
    }
}

fn any_line_contains(lines: &[String], text: &str) -> bool {
    let needle = text.to_lowercase();
    lines.iter().any(|line| line.to_lowercase().contains(&needle))
}

impl ExecutionResult {
    /// Case-insensitive substring search over `all_output`.
    pub fn output_contains(&self, text: &str) -> bool {
        any_line_contains(&self.all_output, text)
    }

    pub fn declared(&self, name: &str) -> bool {
        self.variables.declared.contains(name)
    }

    pub fn accessed(&self, name: &str) -> bool {
        self.variables.accessed.contains(name)
    }

    pub fn binding(&self, name: &str) -> Option<&JsonValue> {
        self.context.get(name)
    }

    pub fn count(&self, capability: Capability) -> u32 {
        self.call_counts.get(capability)
    }

    pub fn timed_out(&self) -> bool {
        self.error_kind == Some(ErrorKind::TimeoutError)
    }
}

impl FunctionInvocationResult {
    pub fn output_contains(&self, text: &str) -> bool {
        any_line_contains(&self.all_output, text)
    }

    pub fn count(&self, capability: Capability) -> u32 {
        self.call_counts.get(capability)
    }

    pub fn is_not_found(&self) -> bool {
        self.error_kind == Some(ErrorKind::NotFoundError)
    }
}
