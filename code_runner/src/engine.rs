//! Embedded JavaScript Engine
//!
//! An [`Engine`] wraps one boa [`Context`] with the mocked host installed.
//! It lives on a session's worker thread for as long as the session does, so
//! functions a script declared stay callable afterwards.
//!
//! Host state (the run's [`MockState`], the timer queue and the seeded random
//! source) sits in a thread-local [`Host`]; natives reach it through
//! [`with_host`]. A worker thread owns exactly one engine.

use std::cell::RefCell;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use boa_engine::error::JsNativeErrorKind;
use boa_engine::vm::RuntimeLimits;
use boa_engine::{
    Context, JsError, JsNativeError, JsObject, JsResult, JsString, JsValue, Script, Source,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::{Map, Number, Value as JsonValue};
use tracing::debug;
use util::execution_config::ExecutionLimits;

use crate::error::SandboxError;
use crate::interception::ObservedGlobals;
use crate::interception::scan::{SourceNames, is_identifier, scan};
use crate::mock_state::MockState;
use crate::mocks::install_host_capabilities;
use crate::scheduler::Scheduler;

pub(crate) type SharedMocks = Arc<Mutex<MockState>>;

/// Locks the run's mock state; a poisoned lock still holds usable data.
pub(crate) fn lock(mocks: &SharedMocks) -> MutexGuard<'_, MockState> {
    mocks.lock().unwrap_or_else(PoisonError::into_inner)
}

const STACK_OVERFLOW: &str = "RangeError: Maximum call stack size exceeded";
const RANDOM_SEED: u64 = 0x5eed_cafe;
const MIN_STACK_SLOTS: usize = 10 * 1024;
const STACK_SLOTS_PER_CALL: usize = 64;
const SNAPSHOT_DEPTH: usize = 64;
const SNAPSHOT_ITEMS: u32 = 10_000;
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

pub(crate) struct Host {
    pub(crate) mocks: SharedMocks,
    pub(crate) scheduler: Scheduler,
    pub(crate) rng: StdRng,
    pub(crate) object_keys: Option<JsObject>,
    deadline: Instant,
    expired: bool,
}

impl Host {
    /// Fails every host call once the run's wall-clock budget is spent.
    pub(crate) fn check_deadline(&mut self) -> JsResult<()> {
        if Instant::now() >= self.deadline {
            self.expired = true;
        }
        if self.expired {
            return Err(JsNativeError::error()
                .with_message("Execution timed out")
                .into());
        }
        Ok(())
    }
}

thread_local! {
    static HOST: RefCell<Option<Host>> = const { RefCell::new(None) };
}

/// Runs `f` against this thread's host, if an engine installed one.
///
/// Never call back into JavaScript from `f`.
pub(crate) fn with_host<R>(f: impl FnOnce(&mut Host) -> R) -> Option<R> {
    HOST.with(|host| host.borrow_mut().as_mut().map(f))
}

/// What a script run leaves behind.
#[derive(Debug)]
pub(crate) struct ScriptRun {
    pub(crate) outcome: Result<(), SandboxError>,
    pub(crate) globals: ObservedGlobals,
    pub(crate) context: Map<String, JsonValue>,
}

impl ScriptRun {
    pub(crate) fn failed(err: SandboxError) -> Self {
        Self {
            outcome: Err(err),
            globals: ObservedGlobals::new(),
            context: Map::new(),
        }
    }
}

pub(crate) struct Engine {
    pub(crate) context: Context,
    pub(crate) limits: ExecutionLimits,
    pub(crate) mocks: SharedMocks,
    object_keys: JsObject,
}

impl Engine {
    pub(crate) fn new(limits: &ExecutionLimits) -> JsResult<Self> {
        let mut context = Context::default();

        let mut runtime = RuntimeLimits::default();
        runtime.set_loop_iteration_limit(limits.loop_iteration_budget());
        runtime.set_recursion_limit(limits.max_call_depth);
        runtime.set_stack_size_limit(
            limits
                .max_call_depth
                .saturating_mul(STACK_SLOTS_PER_CALL)
                .max(MIN_STACK_SLOTS),
        );
        context.set_runtime_limits(runtime);

        // Captured before the fragment can replace `Object.keys`.
        let object = context
            .global_object()
            .get(JsString::from("Object"), &mut context)?;
        let keys = match object_of(&object) {
            Some(object) => object.get(JsString::from("keys"), &mut context)?,
            None => JsValue::undefined(),
        };
        let object_keys = object_of(&keys)
            .filter(JsObject::is_callable)
            .ok_or_else(|| JsNativeError::typ().with_message("Object.keys is not callable"))?;

        install_host_capabilities(&mut context)?;

        let mocks = SharedMocks::default();
        HOST.with(|host| {
            *host.borrow_mut() = Some(Host {
                mocks: Arc::clone(&mocks),
                scheduler: Scheduler::default(),
                rng: StdRng::seed_from_u64(RANDOM_SEED),
                object_keys: Some(object_keys.clone()),
                deadline: Instant::now(),
                expired: false,
            });
        });

        Ok(Self {
            context,
            limits: limits.clone(),
            mocks,
            object_keys,
        })
    }

    /// Points the host at a new run's mock state and restarts the clock.
    fn begin(&mut self, mocks: SharedMocks, limits: &ExecutionLimits) {
        let deadline = Instant::now() + Duration::from_millis(limits.timeout_ms);
        self.limits = limits.clone();
        self.mocks = Arc::clone(&mocks);
        with_host(|host| {
            host.mocks = mocks;
            host.deadline = deadline;
            host.expired = false;
            host.scheduler.clear();
        });
    }

    /// Compiles and runs a whole fragment, then drains promise jobs and timers.
    pub(crate) fn run(&mut self, code: &str, mocks: SharedMocks, limits: &ExecutionLimits) -> ScriptRun {
        self.begin(mocks, limits);

        let script = match Script::parse(Source::from_bytes(code.as_bytes()), None, &mut self.context)
        {
            Ok(script) => script,
            Err(err) => {
                let err = SandboxError::from_syntax(&err.to_string());
                debug!("fragment failed to compile: {err}");
                return ScriptRun::failed(err);
            }
        };

        let names = scan(code);
        let baseline: Vec<Option<JsValue>> = names
            .candidates
            .iter()
            .map(|name| self.resolve(name))
            .collect();

        let outcome = match script.evaluate(&mut self.context) {
            Ok(_) => self.settle(),
            Err(err) => Err(self.describe(err)),
        };
        let outcome = self.finish(outcome);

        let (globals, context) = self.observe(&names, baseline);
        with_host(|host| host.scheduler.clear());
        ScriptRun {
            outcome,
            globals,
            context,
        }
    }

    /// Calls the global function `name` with JSON arguments.
    pub(crate) fn call(
        &mut self,
        name: &str,
        args: &[JsonValue],
        mocks: SharedMocks,
        limits: &ExecutionLimits,
    ) -> Result<JsonValue, SandboxError> {
        self.begin(mocks, limits);

        let callee = self
            .resolve(name)
            .filter(JsValue::is_callable)
            .ok_or_else(|| SandboxError::not_found(name))?;

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match JsValue::from_json(arg, &mut self.context) {
                Ok(value) => values.push(value),
                Err(err) => return Err(self.describe(err)),
            }
        }

        let returned = match callee.as_callable() {
            Some(function) => function.call(&JsValue::undefined(), &values, &mut self.context),
            None => return Err(SandboxError::not_found(name)),
        };
        let outcome = match returned {
            Ok(value) => self.settle().map(|()| value),
            Err(err) => Err(self.describe(err)),
        };
        let outcome = self.finish(outcome).map(|value| self.to_json(&value));
        with_host(|host| host.scheduler.clear());
        outcome
    }

    /// Declared parameter count of the global function `name`.
    pub(crate) fn arity(&mut self, name: &str) -> Option<usize> {
        let callee = self.resolve(name)?;
        let function = callee.as_callable()?;
        let length = function
            .get(JsString::from("length"), &mut self.context)
            .ok()?
            .as_number()?;
        (length >= 0.0 && length.fract() == 0.0).then_some(length as usize)
    }

    /// Value of a global identifier, or `None` when it is not bound.
    fn resolve(&mut self, name: &str) -> Option<JsValue> {
        if !is_identifier(name) {
            return None;
        }
        self.context.eval(Source::from_bytes(name.as_bytes())).ok()
    }

    fn settle(&mut self) -> Result<(), SandboxError> {
        self.run_jobs();
        self.drain_timers()
    }

    pub(crate) fn run_jobs(&mut self) {
        let _ = self.context.run_jobs();
    }

    fn expired(&self) -> bool {
        with_host(|host| host.expired).unwrap_or(false)
    }

    pub(crate) fn check_deadline(&self) -> Result<(), SandboxError> {
        match with_host(Host::check_deadline) {
            Some(Err(_)) => Err(SandboxError::timed_out(self.limits.timeout_ms)),
            _ => Ok(()),
        }
    }

    /// A run that outlived its budget is a timeout, whatever else happened.
    fn finish<T>(&self, outcome: Result<T, SandboxError>) -> Result<T, SandboxError> {
        if self.expired() {
            return Err(SandboxError::timed_out(self.limits.timeout_ms));
        }
        outcome
    }

    pub(crate) fn describe(&mut self, err: JsError) -> SandboxError {
        if self.expired() {
            return SandboxError::timed_out(self.limits.timeout_ms);
        }
        if let Some(native) = err.as_native() {
            if matches!(native.kind, JsNativeErrorKind::RuntimeLimit) {
                if native.message().to_lowercase().contains("loop") {
                    return SandboxError::timed_out(self.limits.timeout_ms);
                }
                return SandboxError::Runtime(STACK_OVERFLOW.to_string());
            }
            return SandboxError::Runtime(normalize(native.to_string()));
        }
        match err.as_opaque() {
            Some(thrown) => {
                let thrown = thrown.clone();
                SandboxError::Runtime(normalize(self.describe_thrown(&thrown)))
            }
            None => SandboxError::Runtime(normalize(err.to_string())),
        }
    }

    /// `Name: message` for error objects, `Uncaught value` for anything else.
    fn describe_thrown(&mut self, thrown: &JsValue) -> String {
        if let Some(error) = object_of(thrown) {
            let message = error
                .get(JsString::from("message"), &mut self.context)
                .unwrap_or_else(|_| JsValue::undefined());
            if !message.is_undefined() {
                let name = error
                    .get(JsString::from("name"), &mut self.context)
                    .ok()
                    .filter(|name| !name.is_undefined())
                    .map(|name| text(&name, &mut self.context))
                    .unwrap_or_else(|| "Error".to_string());
                let message = text(&message, &mut self.context);
                return if message.is_empty() {
                    name
                } else {
                    format!("{name}: {message}")
                };
            }
        }
        format!("Uncaught {}", text(thrown, &mut self.context))
    }

    /// Every scanned name that is bound after the run and was absent or
    /// different before it is a fragment binding.
    fn observe(
        &mut self,
        names: &SourceNames,
        baseline: Vec<Option<JsValue>>,
    ) -> (ObservedGlobals, Map<String, JsonValue>) {
        let mut globals = ObservedGlobals::new();
        let mut snapshot = Map::new();
        for (name, before) in names.candidates.iter().zip(baseline) {
            let Some(after) = self.resolve(name) else {
                continue;
            };
            if before.is_some_and(|before| before.strict_equals(&after)) {
                continue;
            }
            globals.record_declared(name);
            if names.is_read(name) {
                globals.record_access(name);
            }
            snapshot.insert(name.clone(), self.to_json(&after));
        }
        (globals, snapshot)
    }

    pub(crate) fn to_json(&mut self, value: &JsValue) -> JsonValue {
        to_json(value, &self.object_keys, &mut self.context)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Queued callbacks and captured objects must go before the context.
        let _ = HOST.try_with(|host| host.borrow_mut().take());
    }
}

fn normalize(message: String) -> String {
    let lower = message.to_lowercase();
    if lower.contains("recursion limit") || lower.contains("call stack size") {
        STACK_OVERFLOW.to_string()
    } else {
        message
    }
}

/// Owned handle to the object behind `value`, if it is one.
pub(crate) fn object_of(value: &JsValue) -> Option<JsObject> {
    value.as_object().map(|object| JsObject::clone(&object))
}

/// `String(value)`, falling back to a debug rendering for symbols.
pub(crate) fn text(value: &JsValue, context: &mut Context) -> String {
    value
        .to_string(context)
        .map(|s| s.to_std_string_escaped())
        .unwrap_or_else(|_| value.display().to_string())
}

/// JSON snapshot of a JavaScript value.
///
/// Functions become `"[Function name]"`, cycles `"[Circular]"` and
/// non-finite numbers their names. Nesting deeper than 64 levels is cut off.
pub(crate) fn to_json(value: &JsValue, object_keys: &JsObject, context: &mut Context) -> JsonValue {
    Snapshot {
        object_keys,
        seen: Vec::new(),
    }
    .value(value, 0, context)
}

struct Snapshot<'a> {
    object_keys: &'a JsObject,
    seen: Vec<JsObject>,
}

impl Snapshot<'_> {
    fn value(&mut self, value: &JsValue, depth: usize, context: &mut Context) -> JsonValue {
        if value.is_undefined() || value.is_null() {
            return JsonValue::Null;
        }
        if let Some(flag) = value.as_boolean() {
            return JsonValue::Bool(flag);
        }
        if let Some(n) = value.as_number() {
            return number(n);
        }
        if let Some(s) = value.as_string() {
            return JsonValue::String(s.to_std_string_escaped());
        }
        match object_of(value) {
            Some(object) => self.object(&object, depth, context),
            None => JsonValue::String(value.display().to_string()),
        }
    }

    fn object(&mut self, object: &JsObject, depth: usize, context: &mut Context) -> JsonValue {
        if object.is_callable() {
            let name = object
                .get(JsString::from("name"), context)
                .ok()
                .and_then(|name| name.as_string().map(|s| s.to_std_string_escaped()))
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "anonymous".to_string());
            return JsonValue::String(format!("[Function {name}]"));
        }
        if self.seen.iter().any(|seen| JsObject::equals(seen, object)) {
            return JsonValue::String("[Circular]".to_string());
        }
        let array = object.is_array();
        if depth >= SNAPSHOT_DEPTH {
            let cut = if array { "[Array]" } else { "[Object]" };
            return JsonValue::String(cut.to_string());
        }

        self.seen.push(object.clone());
        let json = if array {
            self.array(object, depth, context)
        } else {
            self.record(object, depth, context)
        };
        self.seen.pop();
        json
    }

    fn array(&mut self, array: &JsObject, depth: usize, context: &mut Context) -> JsonValue {
        let len = array
            .get(JsString::from("length"), context)
            .and_then(|len| len.to_length(context))
            .unwrap_or(0);
        let len = u32::try_from(len).unwrap_or(u32::MAX).min(SNAPSHOT_ITEMS);
        let items = (0..len)
            .map(|index| {
                let item = array
                    .get(index, context)
                    .unwrap_or_else(|_| JsValue::undefined());
                self.value(&item, depth + 1, context)
            })
            .collect();
        JsonValue::Array(items)
    }

    fn record(&mut self, object: &JsObject, depth: usize, context: &mut Context) -> JsonValue {
        let keys = self
            .object_keys
            .call(&JsValue::undefined(), &[JsValue::from(object.clone())], context)
            .ok()
            .as_ref()
            .and_then(object_of);
        let Some(keys) = keys else {
            return JsonValue::Object(Map::new());
        };
        let count = keys
            .get(JsString::from("length"), context)
            .and_then(|len| len.to_length(context))
            .unwrap_or(0);
        let count = u32::try_from(count).unwrap_or(u32::MAX).min(SNAPSHOT_ITEMS);

        let mut fields = Map::new();
        for index in 0..count {
            let Some(key) = keys
                .get(index, context)
                .ok()
                .and_then(|key| key.as_string().map(|s| s.to_std_string_escaped()))
            else {
                continue;
            };
            let value = object
                .get(JsString::from(key.as_str()), context)
                .unwrap_or_else(|_| JsValue::undefined());
            let value = self.value(&value, depth + 1, context);
            fields.insert(key, value);
        }
        JsonValue::Object(fields)
    }
}

fn number(n: f64) -> JsonValue {
    if n.is_nan() {
        return JsonValue::String("NaN".to_string());
    }
    if n.is_infinite() {
        let name = if n > 0.0 { "Infinity" } else { "-Infinity" };
        return JsonValue::String(name.to_string());
    }
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return JsonValue::from(n as i64);
    }
    Number::from_f64(n).map_or(JsonValue::Null, JsonValue::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine() -> Engine {
        Engine::new(&ExecutionLimits::default()).unwrap()
    }

    fn run(engine: &mut Engine, code: &str) -> (ScriptRun, MockState) {
        let mocks = SharedMocks::default();
        let run = engine.run(code, Arc::clone(&mocks), &ExecutionLimits::default());
        let state = lock(&mocks).clone();
        (run, state)
    }

    #[test]
    fn snapshots_cover_cycles_functions_and_odd_numbers() {
        let mut engine = engine();
        let (run, _) = run(
            &mut engine,
            "const data = { n: 1.5, big: 2 ** 60, nan: NaN, inf: -Infinity, f: function area() {}, list: [1, 'a', null, undefined] };\ndata.self = data;",
        );
        assert_eq!(run.outcome, Ok(()));
        let data = &run.context["data"];
        assert_eq!(data["n"], json!(1.5));
        assert_eq!(data["big"], json!(2f64.powi(60)));
        assert_eq!(data["nan"], json!("NaN"));
        assert_eq!(data["inf"], json!("-Infinity"));
        assert_eq!(data["f"], json!("[Function area]"));
        assert_eq!(data["list"], json!([1, "a", null, null]));
        assert_eq!(data["self"], json!("[Circular]"));
    }

    #[test]
    fn deep_structures_are_cut_off() {
        let mut engine = engine();
        let (run, _) = run(
            &mut engine,
            "let head = null;\nfor (let i = 0; i < 200; i++) { head = { v: i, next: head }; }",
        );
        assert_eq!(run.outcome, Ok(()));
        let mut node = &run.context["head"];
        for _ in 0..SNAPSHOT_DEPTH {
            node = &node["next"];
        }
        assert_eq!(node, &json!("[Object]"));
    }

    #[test]
    fn host_bindings_are_not_fragment_bindings() {
        let mut engine = engine();
        let (run, state) = run(&mut engine, "let x = prompt('x?'); console.log(Math.max(1, 2));");
        assert_eq!(run.globals.fragment_names().collect::<Vec<_>>(), ["x"]);
        assert_eq!(state.console_output(), ["PROMPT: x?", "2"]);
    }

    #[test]
    fn replacing_a_host_binding_makes_it_the_fragment_s() {
        let mut engine = engine();
        let (run, _) = run(&mut engine, "alert = function () {};\nalert('hidden');");
        assert!(run.globals.is_fragment("alert"));
        assert!(run.globals.observed().accessed.contains("alert"));
    }

    #[test]
    fn functions_stay_callable_between_calls() {
        let mut engine = engine();
        run(&mut engine, "let calls = 0;\nfunction bump(by = 1) { calls += by; return calls; }");
        let limits = ExecutionLimits::default();
        let first = engine.call("bump", &[json!(2)], SharedMocks::default(), &limits);
        let second = engine.call("bump", &[], SharedMocks::default(), &limits);
        assert_eq!(first, Ok(json!(2)));
        assert_eq!(second, Ok(json!(3)));
        assert_eq!(engine.arity("bump"), Some(0));
        assert_eq!(engine.arity("calls"), None);
        assert_eq!(
            engine.call("calls", &[], SharedMocks::default(), &limits),
            Err(SandboxError::not_found("calls"))
        );
    }

    #[test]
    fn thrown_values_are_described() {
        let mut engine = engine();
        for (code, expected) in [
            ("throw new RangeError('too big')", "RangeError: too big"),
            ("throw { message: 'plain' }", "Error: plain"),
            ("throw 42", "Uncaught 42"),
            ("undefinedFunction()", "ReferenceError"),
        ] {
            let (run, _) = run(&mut engine, code);
            let Err(SandboxError::Runtime(message)) = run.outcome else {
                panic!("{code} should fail at runtime");
            };
            assert!(message.starts_with(expected), "{code}: {message}");
        }
    }

    #[test]
    fn math_random_is_seeded_per_engine() {
        let code = "const roll = Math.random();";
        let (first, _) = run(&mut engine(), code);
        let (second, _) = run(&mut engine(), code);
        assert_eq!(first.context["roll"], second.context["roll"]);
        assert!(first.context["roll"].as_f64().is_some_and(|r| (0.0..1.0).contains(&r)));
    }
}
