use serde_json::Value as JsonValue;
use util::config::AppConfig;
use util::execution_config::ExecutionLimits;

use crate::executor::run_script;
use crate::invoker::{has_function_with_signature, run_function};
use crate::mock_state::MockState;
use crate::result::{ExecutionResult, FunctionInvocationResult};
use crate::session::Session;

/// One grading worker: its own mock state, limits and the session of the
/// most recent script run.
///
/// ```ignore
/// let mut sandbox = Sandbox::default();
/// let run = sandbox.run_script("function add(a, b) { return a + b }", Vec::<String>::new());
/// assert!(run.success);
/// let call = sandbox.run_function("add", &[2.into(), 3.into()]);
/// assert_eq!(call.return_value, 5);
/// ```
pub struct Sandbox {
    mocks: MockState,
    limits: ExecutionLimits,
    session: Option<Session>,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new(ExecutionLimits::default())
    }
}

impl Sandbox {
    pub fn new(limits: ExecutionLimits) -> Self {
        Self {
            mocks: MockState::new(),
            limits,
            session: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(ExecutionLimits::from_config(config))
    }

    /// Runs `code`, replacing the previous session.
    pub fn run_script<I, S>(&mut self, code: &str, responses: I) -> ExecutionResult
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (result, session) = run_script(&mut self.mocks, &self.limits, code, responses);
        self.session = Some(session);
        result
    }

    /// Calls a function declared by the most recent script run.
    pub fn run_function(&mut self, name: &str, args: &[JsonValue]) -> FunctionInvocationResult {
        match self.session.as_mut() {
            Some(session) => run_function(&mut self.mocks, &self.limits, session, name, args),
            None => {
                let mut empty = Session::empty();
                run_function(&mut self.mocks, &self.limits, &mut empty, name, args)
            }
        }
    }

    pub fn has_function_with_signature(&self, name: &str, arity: usize) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| has_function_with_signature(session, name, arity))
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    pub fn mock_state(&self) -> &MockState {
        &self.mocks
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }
}
