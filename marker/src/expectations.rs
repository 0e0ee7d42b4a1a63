//! # Expectations
//!
//! An exercise is marked against an [`ExpectationSet`]: a list of named checks, each worth a
//! number of marks. Checks come in two flavours:
//!
//! - **Run checks** look at the [`ExecutionResult`] of the learner's script: whether it ran,
//!   what it printed, which capabilities it called and which top-level names it declared or read.
//! - **Session checks** use the [`Sandbox`] session the script left behind: whether a function
//!   with a given signature exists and what it returns for given arguments.
//!
//! ## JSON Shape
//!
//! ```json
//! {
//!   "expectations": [
//!     { "name": "Greets the user", "value": 2, "type": "output",
//!       "patterns": ["Hello, Ada"], "scheme": "contains" },
//!     { "name": "Adds numbers", "value": 3, "type": "function_returns",
//!       "function": "add", "args": [2, 3], "expected": 5 }
//!   ]
//! }
//! ```

use code_runner::{Capability, ExecutionResult, ExecutionLimits, Sandbox};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::comparators::contains_comparator::ContainsComparator;
use crate::comparators::numeric_comparator::NumericComparator;
use crate::comparators::regex_comparator::RegexComparator;
use crate::traits::comparator::OutputComparator;
use crate::types::{Subsection, TaskResult};

/// How the patterns of an `output` check are looked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchScheme {
    #[default]
    Contains,
    Regex,
    Numeric {
        #[serde(default)]
        tolerance: f64,
    },
}

impl MatchScheme {
    pub fn comparator(&self) -> Box<dyn OutputComparator> {
        match *self {
            MatchScheme::Contains => Box::new(ContainsComparator),
            MatchScheme::Regex => Box::new(RegexComparator),
            MatchScheme::Numeric { tolerance } => Box::new(NumericComparator { tolerance }),
        }
    }
}

/// A single behavioural check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expectation {
    /// The script finished without a compile error, runtime error or timeout.
    RunsSuccessfully,
    /// The captured output contains the patterns.
    Output {
        patterns: Vec<String>,
        #[serde(default)]
        scheme: MatchScheme,
    },
    /// The script asked for input at least once.
    PromptRequested,
    /// The script created a top-level binding with this name.
    DeclaresVariable { variable: String },
    /// The script read a top-level binding with this name.
    UsesVariable { variable: String },
    /// A host capability was called at least `minimum` times.
    CallCount { capability: Capability, minimum: u32 },
    /// The script declared a function with exactly this many parameters.
    FunctionSignature { function: String, arity: usize },
    /// Calling the function with `args` returns `expected`.
    FunctionReturns {
        function: String,
        #[serde(default)]
        args: Vec<JsonValue>,
        expected: JsonValue,
        #[serde(default)]
        tolerance: Option<f64>,
    },
    /// The top-level binding's final value equals `expected`.
    BindingEquals {
        variable: String,
        expected: JsonValue,
        #[serde(default)]
        tolerance: Option<f64>,
    },
}

/// A named, weighted [`Expectation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationEntry {
    pub name: String,
    #[serde(default = "default_value")]
    pub value: u32,
    #[serde(flatten)]
    pub check: Expectation,
}

fn default_value() -> u32 {
    1
}

/// Every check an exercise is marked against, with optional limits shipped alongside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectationSet {
    #[serde(default)]
    pub limits: Option<ExecutionLimits>,
    pub expectations: Vec<ExpectationEntry>,
}

impl ExpectationSet {
    pub fn total_value(&self) -> u32 {
        self.expectations.iter().map(|entry| entry.value).sum()
    }
}

impl ExpectationEntry {
    pub fn section(&self) -> Subsection {
        Subsection {
            name: self.name.clone(),
            value: self.value,
        }
    }

    /// Marks this entry against a finished run and the session it left in `sandbox`.
    pub fn evaluate(&self, run: &ExecutionResult, sandbox: &mut Sandbox) -> TaskResult {
        self.check.evaluate(&self.section(), run, sandbox)
    }
}

impl Expectation {
    pub fn evaluate(
        &self,
        section: &Subsection,
        run: &ExecutionResult,
        sandbox: &mut Sandbox,
    ) -> TaskResult {
        match self {
            Expectation::RunsSuccessfully => {
                let description = match &run.error {
                    Some(error) => format!("runs without errors (got {error})"),
                    None => "runs without errors".to_string(),
                };
                TaskResult::all_or_nothing(section, run.success, description)
            }
            Expectation::Output { patterns, scheme } => {
                scheme
                    .comparator()
                    .compare(section, patterns, &run.all_output)
            }
            Expectation::PromptRequested => TaskResult::all_or_nothing(
                section,
                run.count(Capability::Prompt) > 0,
                "requests input with prompt".to_string(),
            ),
            Expectation::DeclaresVariable { variable } => TaskResult::all_or_nothing(
                section,
                run.declared(variable),
                format!("declares `{variable}`"),
            ),
            Expectation::UsesVariable { variable } => TaskResult::all_or_nothing(
                section,
                run.accessed(variable),
                format!("uses `{variable}`"),
            ),
            Expectation::CallCount {
                capability,
                minimum,
            } => {
                let calls = run.count(*capability);
                TaskResult::all_or_nothing(
                    section,
                    calls >= *minimum,
                    format!(
                        "calls {} at least {minimum} time(s), called {calls}",
                        capability.as_str()
                    ),
                )
            }
            Expectation::FunctionSignature { function, arity } => TaskResult::all_or_nothing(
                section,
                sandbox.has_function_with_signature(function, *arity),
                format!("defines {function} with {arity} parameter(s)"),
            ),
            Expectation::FunctionReturns {
                function,
                args,
                expected,
                tolerance,
            } => {
                let call = sandbox.run_function(function, args);
                let passed = call.success && values_match(&call.return_value, expected, *tolerance);
                let rendered_args = args
                    .iter()
                    .map(JsonValue::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut description = format!("{function}({rendered_args}) returns {expected}");
                if !passed {
                    match &call.error {
                        Some(error) => description.push_str(&format!(" (got {error})")),
                        None => description.push_str(&format!(" (got {})", call.return_value)),
                    }
                }
                TaskResult::all_or_nothing(section, passed, description)
            }
            Expectation::BindingEquals {
                variable,
                expected,
                tolerance,
            } => {
                let passed = run
                    .binding(variable)
                    .is_some_and(|actual| values_match(actual, expected, *tolerance));
                TaskResult::all_or_nothing(
                    section,
                    passed,
                    format!("`{variable}` ends up as {expected}"),
                )
            }
        }
    }
}

/// Structural equality where numbers compare by value, within `tolerance` when given.
pub fn values_match(actual: &JsonValue, expected: &JsonValue, tolerance: Option<f64>) -> bool {
    match (actual, expected) {
        (JsonValue::Number(a), JsonValue::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => (a - b).abs() <= tolerance.unwrap_or(0.0).abs(),
            _ => a == b,
        },
        (JsonValue::Array(a), JsonValue::Array(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .zip(b)
                    .all(|(x, y)| values_match(x, y, tolerance))
        }
        (JsonValue::Object(a), JsonValue::Object(b)) => {
            a.len() == b.len()
                && a.iter().all(|(key, x)| {
                    b.get(key)
                        .is_some_and(|y| values_match(x, y, tolerance))
                })
        }
        _ => actual == expected,
    }
}
