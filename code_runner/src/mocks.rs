//! Host Capability Mocks
//!
//! Deterministic stand-ins for the globals a fragment expects its host to
//! provide. None of them touch the real terminal, clock or network; every
//! effect is written to the run's [`MockState`](crate::mock_state::MockState).
//! Misuse (missing arguments, unknown timer ids) is absorbed silently.

use boa_engine::object::{FunctionObjectBuilder, ObjectInitializer};
use boa_engine::property::Attribute;
use boa_engine::{Context, JsArgs, JsResult, JsString, JsValue, NativeFunction, js_string};
use rand::Rng;

use crate::engine::{SharedMocks, lock, object_of, text, to_json, with_host};
use crate::mock_state::Capability;

/// A capability implemented by this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HostFn {
    Prompt,
    Alert,
    ConsoleLog,
    ConsoleInfo,
    ConsoleWarn,
    ConsoleError,
    ConsoleDebug,
    ConsoleTable,
    SetInterval,
    ClearInterval,
    SetTimeout,
    ClearTimeout,
    Random,
}

impl HostFn {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            HostFn::Prompt => "prompt",
            HostFn::Alert => "alert",
            HostFn::ConsoleLog => "log",
            HostFn::ConsoleInfo => "info",
            HostFn::ConsoleWarn => "warn",
            HostFn::ConsoleError => "error",
            HostFn::ConsoleDebug => "debug",
            HostFn::ConsoleTable => "table",
            HostFn::SetInterval => "setInterval",
            HostFn::ClearInterval => "clearInterval",
            HostFn::SetTimeout => "setTimeout",
            HostFn::ClearTimeout => "clearTimeout",
            HostFn::Random => "random",
        }
    }

    fn length(&self) -> usize {
        match self {
            HostFn::Prompt | HostFn::Alert => 1,
            HostFn::SetInterval | HostFn::SetTimeout => 2,
            HostFn::ClearInterval | HostFn::ClearTimeout => 1,
            _ => 0,
        }
    }

    fn to_function(self, context: &mut Context) -> JsValue {
        let native = NativeFunction::from_copy_closure(move |_this, args, ctx| self.invoke(args, ctx));
        FunctionObjectBuilder::new(context.realm(), native)
            .name(JsString::from(self.name()))
            .length(self.length())
            .constructor(false)
            .build()
            .into()
    }

    fn invoke(self, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
        let mocks = host_mocks()?;
        match self {
            HostFn::Prompt => {
                let message = text_arg(args, 0, ctx);
                let fallback = text_arg(args, 1, ctx);
                let mut state = lock(&mocks);
                state.count(Capability::Prompt);
                state.record_prompt(&message);
                let answer = state.next_response().unwrap_or(fallback);
                Ok(JsString::from(answer.as_str()).into())
            }
            HostFn::Alert => {
                let message = text_arg(args, 0, ctx);
                let mut state = lock(&mocks);
                state.count(Capability::Alert);
                state.record_alert(message);
                Ok(JsValue::undefined())
            }
            HostFn::ConsoleLog
            | HostFn::ConsoleInfo
            | HostFn::ConsoleWarn
            | HostFn::ConsoleError
            | HostFn::ConsoleDebug => {
                let line = args
                    .iter()
                    .map(|arg| text(arg, ctx))
                    .collect::<Vec<_>>()
                    .join(" ");
                let mut state = lock(&mocks);
                state.count(Capability::ConsoleLog);
                state.record_console(line);
                Ok(JsValue::undefined())
            }
            HostFn::ConsoleTable => {
                let data = args.get_or_undefined(0).clone();
                let rendered = match with_host(|host| host.object_keys.clone()).flatten() {
                    Some(keys) => serde_json::to_string(&to_json(&data, &keys, ctx)).unwrap_or_default(),
                    None => String::new(),
                };
                let mut state = lock(&mocks);
                state.count(Capability::ConsoleTable);
                state.record_table(&rendered);
                Ok(JsValue::undefined())
            }
            HostFn::SetInterval | HostFn::SetTimeout => {
                let repeating = self == HostFn::SetInterval;
                let id = {
                    let mut state = lock(&mocks);
                    state.count(if repeating {
                        Capability::SetInterval
                    } else {
                        Capability::SetTimeout
                    });
                    state.start_timer()
                };
                let callback = args.get_or_undefined(0).clone();
                // Delay is ignored; remaining arguments go to the callback.
                let extra = args.get(2..).map(<[JsValue]>::to_vec).unwrap_or_default();
                if callback.is_callable() {
                    with_host(|host| host.scheduler.schedule(id, callback, extra, repeating));
                }
                Ok(JsValue::from(id))
            }
            HostFn::ClearInterval | HostFn::ClearTimeout => {
                let mut state = lock(&mocks);
                state.count(if self == HostFn::ClearInterval {
                    Capability::ClearInterval
                } else {
                    Capability::ClearTimeout
                });
                if let Some(id) = timer_id(args) {
                    state.stop_timer(id);
                }
                Ok(JsValue::undefined())
            }
            HostFn::Random => {
                let roll = with_host(|host| host.rng.gen_range(0.0..1.0)).unwrap_or(0.0);
                Ok(JsValue::from(roll))
            }
        }
    }
}

const GLOBAL_CAPABILITIES: [HostFn; 6] = [
    HostFn::Prompt,
    HostFn::Alert,
    HostFn::SetInterval,
    HostFn::ClearInterval,
    HostFn::SetTimeout,
    HostFn::ClearTimeout,
];

const CONSOLE_METHODS: [HostFn; 6] = [
    HostFn::ConsoleLog,
    HostFn::ConsoleInfo,
    HostFn::ConsoleWarn,
    HostFn::ConsoleError,
    HostFn::ConsoleDebug,
    HostFn::ConsoleTable,
];

/// Escape hatches bound to `undefined` so fragments cannot reach the host.
pub(crate) const BLOCKED_GLOBALS: [&str; 14] = [
    "require",
    "importScripts",
    "fetch",
    "XMLHttpRequest",
    "WebSocket",
    "Worker",
    "SharedArrayBuffer",
    "Atomics",
    "process",
    "global",
    "globalThis",
    "eval",
    "Function",
    "queueMicrotask",
];

/// Installs the mocked capabilities, placeholders and blocked names.
pub(crate) fn install_host_capabilities(context: &mut Context) -> JsResult<()> {
    for host in GLOBAL_CAPABILITIES {
        let function = host.to_function(context);
        context.register_global_property(JsString::from(host.name()), function, Attribute::all())?;
    }

    let methods: Vec<(HostFn, JsValue)> = CONSOLE_METHODS
        .into_iter()
        .map(|host| (host, host.to_function(context)))
        .collect();
    let mut console = ObjectInitializer::new(context);
    for (host, function) in methods {
        console.property(JsString::from(host.name()), function, Attribute::all());
    }
    let console = console.build();
    context.register_global_property(js_string!("console"), console, Attribute::all())?;

    let document = ObjectInitializer::new(context).build();
    context.register_global_property(js_string!("document"), document, Attribute::all())?;
    let window = ObjectInitializer::new(context).build();
    context.register_global_property(js_string!("window"), window, Attribute::all())?;
    let exports = ObjectInitializer::new(context).build();
    let module = ObjectInitializer::new(context)
        .property(js_string!("exports"), exports.clone(), Attribute::all())
        .build();
    context.register_global_property(js_string!("module"), module, Attribute::all())?;
    context.register_global_property(js_string!("exports"), exports, Attribute::all())?;

    // Math.random draws from the engine's seeded source.
    let math = context.global_object().get(js_string!("Math"), context)?;
    if let Some(math) = object_of(&math) {
        let random = HostFn::Random.to_function(context);
        math.set(js_string!("random"), random, false, context)?;
    }

    for name in BLOCKED_GLOBALS {
        context.register_global_property(JsString::from(name), JsValue::undefined(), Attribute::all())?;
    }
    Ok(())
}

/// The run's mock state; fails once the run is out of time.
fn host_mocks() -> JsResult<SharedMocks> {
    match with_host(|host| host.check_deadline().map(|()| SharedMocks::clone(&host.mocks))) {
        Some(mocks) => mocks,
        None => Ok(SharedMocks::default()),
    }
}

fn text_arg(args: &[JsValue], idx: usize, ctx: &mut Context) -> String {
    match args.get(idx) {
        None => String::new(),
        Some(value) if value.is_undefined() => String::new(),
        Some(value) => text(value, ctx),
    }
}

fn timer_id(args: &[JsValue]) -> Option<u32> {
    let n = args.first()?.as_number()?;
    (n >= 1.0 && n.fract() == 0.0 && n <= f64::from(u32::MAX)).then_some(n as u32)
}
