//! Sandboxed execution and behavioural instrumentation for learner code.
//!
//! A fragment runs inside an embedded boa engine on a dedicated worker thread
//! (see [`Session`]), against mocked host capabilities whose effects land in
//! a [`MockState`]. The [`interception`] layer works out which top-level
//! names the fragment declared and read. The [`executor`] and [`invoker`]
//! never return a Rust error: every failure becomes a result record (see
//! [`result`]).
//!
//! Use [`Sandbox`] unless you need to manage mock state yourself.

pub(crate) mod engine;
pub mod error;
pub mod executor;
pub mod interception;
pub mod invoker;
pub mod mock_state;
pub(crate) mod mocks;
pub mod result;
mod sandbox;
pub(crate) mod scheduler;
mod session;

pub use error::{ErrorKind, SandboxError};
pub use executor::run_script;
pub use invoker::{has_function_with_signature, run_function};
pub use mock_state::{CallCounts, Capability, MockState, TimerRecord};
pub use result::{ExecutionResult, FunctionInvocationResult, ObservedIdentifiers};
pub use sandbox::Sandbox;
pub use session::Session;
pub use util::execution_config::ExecutionLimits;
