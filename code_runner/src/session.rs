//! Sandbox Sessions
//!
//! A [`Session`] owns one worker thread with a large stack and the [`Engine`]
//! living on it. The caller talks to the worker over a channel and stops
//! waiting once the run's wall-clock budget is spent; a worker that is still
//! busy then marks the session as stalled until its reply arrives.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tracing::{debug, error, warn};
use util::execution_config::ExecutionLimits;

use crate::engine::{Engine, ScriptRun, SharedMocks, lock};
use crate::error::SandboxError;
use crate::interception::ObservedGlobals;
use crate::mock_state::MockState;

const WORKER_STACK_BYTES: usize = 128 * 1024 * 1024;
/// Slack for channel hops and thread scheduling on top of the run's budget.
const REPLY_GRACE: Duration = Duration::from_millis(100);

enum Request {
    Run {
        code: String,
        limits: ExecutionLimits,
        mocks: SharedMocks,
        reply: SyncSender<ScriptRun>,
    },
    Call {
        name: String,
        args: Vec<JsonValue>,
        limits: ExecutionLimits,
        mocks: SharedMocks,
        reply: SyncSender<Result<JsonValue, SandboxError>>,
    },
    Arity {
        name: String,
        reply: SyncSender<Option<usize>>,
    },
}

/// A reply the caller gave up waiting for.
enum Pending {
    Run(Receiver<ScriptRun>),
    Call(Receiver<Result<JsonValue, SandboxError>>),
}

impl Pending {
    /// True once the worker has answered (or died) and is free again.
    fn settled(&self, wait: Duration) -> bool {
        let received = match self {
            Pending::Run(rx) => rx.recv_timeout(wait).map(drop),
            Pending::Call(rx) => rx.recv_timeout(wait).map(drop),
        };
        !matches!(received, Err(RecvTimeoutError::Timeout))
    }
}

/// The top-level scope left behind by a script run.
///
/// This is the one context that outlives its run: the invoker calls functions
/// the script declared against these same bindings.
pub struct Session {
    worker: Option<Sender<Request>>,
    pub(crate) globals: ObservedGlobals,
    limits: ExecutionLimits,
    stalled: Option<Pending>,
}

impl Session {
    /// Spawns the worker and waits until its engine is ready.
    pub(crate) fn start(limits: &ExecutionLimits) -> Result<Self, SandboxError> {
        let (tx, rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let engine_limits = limits.clone();
        thread::Builder::new()
            .name("sandbox-session".to_string())
            .stack_size(WORKER_STACK_BYTES)
            .spawn(move || serve(engine_limits, rx, ready_tx))
            .map_err(|e| SandboxError::Runtime(format!("Failed to start sandbox worker: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                worker: Some(tx),
                globals: ObservedGlobals::new(),
                limits: limits.clone(),
                stalled: None,
            }),
            Ok(Err(message)) => Err(SandboxError::Runtime(message)),
            Err(_) => Err(stopped()),
        }
    }

    /// A session with no script behind it; every function is missing.
    pub(crate) fn empty() -> Self {
        Self {
            worker: None,
            globals: ObservedGlobals::new(),
            limits: ExecutionLimits::default(),
            stalled: None,
        }
    }

    /// Names of the bindings the fragment created, in declaration order.
    pub fn binding_names(&self) -> Vec<String> {
        self.globals.fragment_names().map(str::to_string).collect()
    }

    /// Runs `code` on the worker. Observed globals replace the previous ones.
    pub(crate) fn run(&mut self, code: &str, limits: &ExecutionLimits, mocks: &mut MockState) -> ScriptRun {
        let worker = match self.ready(limits) {
            Ok(worker) => worker,
            Err(err) => return ScriptRun::failed(err),
        };
        let shared: SharedMocks = Arc::new(Mutex::new(mocks.clone()));
        let (reply, rx) = mpsc::sync_channel(1);
        let request = Request::Run {
            code: code.to_string(),
            limits: limits.clone(),
            mocks: Arc::clone(&shared),
            reply,
        };
        if worker.send(request).is_err() {
            return ScriptRun::failed(stopped());
        }

        let run = match rx.recv_timeout(budget(limits)) {
            Ok(run) => run,
            Err(RecvTimeoutError::Timeout) => {
                warn!(timeout_ms = limits.timeout_ms, "script still running after its budget");
                self.stalled = Some(Pending::Run(rx));
                ScriptRun::failed(SandboxError::timed_out(limits.timeout_ms))
            }
            Err(RecvTimeoutError::Disconnected) => ScriptRun::failed(stopped()),
        };
        *mocks = lock(&shared).clone();
        self.globals = run.globals.clone();
        run
    }

    /// Calls the global function `name` on the worker.
    pub(crate) fn call(
        &mut self,
        name: &str,
        args: &[JsonValue],
        limits: &ExecutionLimits,
        mocks: &mut MockState,
    ) -> Result<JsonValue, SandboxError> {
        if self.worker.is_none() {
            return Err(SandboxError::not_found(name));
        }
        let worker = self.ready(limits)?;
        let shared: SharedMocks = Arc::new(Mutex::new(mocks.clone()));
        let (reply, rx) = mpsc::sync_channel(1);
        let request = Request::Call {
            name: name.to_string(),
            args: args.to_vec(),
            limits: limits.clone(),
            mocks: Arc::clone(&shared),
            reply,
        };
        worker.send(request).map_err(|_| stopped())?;

        let outcome = match rx.recv_timeout(budget(limits)) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => {
                warn!(function = name, timeout_ms = limits.timeout_ms, "call still running after its budget");
                self.stalled = Some(Pending::Call(rx));
                Err(SandboxError::timed_out(limits.timeout_ms))
            }
            Err(RecvTimeoutError::Disconnected) => Err(stopped()),
        };
        *mocks = lock(&shared).clone();
        outcome
    }

    /// Declared parameter count of the global function `name`, if any.
    pub(crate) fn arity(&self, name: &str) -> Option<usize> {
        if self.stalled.is_some() {
            return None;
        }
        let worker = self.worker.as_ref()?;
        let (reply, rx) = mpsc::sync_channel(1);
        worker
            .send(Request::Arity {
                name: name.to_string(),
                reply,
            })
            .ok()?;
        rx.recv_timeout(budget(&self.limits)).ok().flatten()
    }

    /// The worker channel, once any stalled request has finished.
    fn ready(&mut self, limits: &ExecutionLimits) -> Result<Sender<Request>, SandboxError> {
        if let Some(pending) = self.stalled.take() {
            if !pending.settled(budget(limits)) {
                debug!("sandbox worker is still busy with an abandoned run");
                self.stalled = Some(pending);
                return Err(SandboxError::timed_out(limits.timeout_ms));
            }
        }
        self.worker.clone().ok_or_else(stopped)
    }
}

fn budget(limits: &ExecutionLimits) -> Duration {
    Duration::from_millis(limits.timeout_ms) + REPLY_GRACE
}

fn stopped() -> SandboxError {
    SandboxError::Runtime("Sandbox worker is not running".to_string())
}

/// Worker loop: one engine, requests served in order until the session drops.
fn serve(limits: ExecutionLimits, requests: Receiver<Request>, ready: SyncSender<Result<(), String>>) {
    let mut engine = match Engine::new(&limits) {
        Ok(engine) => engine,
        Err(err) => {
            error!("failed to build sandbox engine: {err}");
            let _ = ready.send(Err(format!("Failed to start sandbox engine: {err}")));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        return;
    }

    // Replies to abandoned requests have nowhere to go; dropping them is fine.
    for request in requests {
        match request {
            Request::Run {
                code,
                limits,
                mocks,
                reply,
            } => {
                let _ = reply.send(engine.run(&code, mocks, &limits));
            }
            Request::Call {
                name,
                args,
                limits,
                mocks,
                reply,
            } => {
                let _ = reply.send(engine.call(&name, &args, mocks, &limits));
            }
            Request::Arity { name, reply } => {
                let _ = reply.send(engine.arity(&name));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn functions_survive_between_requests() {
        let limits = ExecutionLimits::default();
        let mut mocks = MockState::new();
        let mut session = Session::start(&limits).unwrap();
        let run = session.run("function add(a, b) { return a + b }", &limits, &mut mocks);
        assert_eq!(run.outcome, Ok(()));
        assert_eq!(session.binding_names(), ["add"]);
        assert_eq!(session.arity("add"), Some(2));
        assert_eq!(session.call("add", &[json!(2), json!(3)], &limits, &mut mocks), Ok(json!(5)));
    }

    #[test]
    fn mock_effects_come_back_to_the_caller() {
        let limits = ExecutionLimits::default();
        let mut mocks = MockState::new();
        mocks.load_responses(["Ada"]);
        let mut session = Session::start(&limits).unwrap();
        session.run("const name = prompt('Name?'); alert('Hi ' + name);", &limits, &mut mocks);
        assert_eq!(mocks.alert_output(), ["Hi Ada"]);
        assert_eq!(mocks.pending_responses(), 0);
    }

    #[test]
    fn empty_sessions_have_no_functions() {
        let limits = ExecutionLimits::default();
        let mut session = Session::empty();
        let mut mocks = MockState::new();
        assert_eq!(
            session.call("area", &[], &limits, &mut mocks),
            Err(SandboxError::not_found("area"))
        );
        assert_eq!(session.arity("area"), None);
        assert!(session.binding_names().is_empty());
    }

    #[test]
    fn deep_recursion_fails_cleanly_on_the_worker_stack() {
        let limits = ExecutionLimits::default();
        let mut mocks = MockState::new();
        let mut session = Session::start(&limits).unwrap();
        let run = session.run("function down(n) { return down(n + 1) }\ndown(0);", &limits, &mut mocks);
        assert_eq!(
            run.outcome,
            Err(SandboxError::Runtime("RangeError: Maximum call stack size exceeded".into()))
        );
        let run = session.run("console.log('still alive')", &limits, &mut mocks);
        assert_eq!(run.outcome, Ok(()));
    }
}
