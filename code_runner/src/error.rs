//! Sandbox Error Types
//!
//! [`SandboxError`] is the taxonomy of every way a run can fail. It never
//! escapes the executor or invoker as a Rust error; instead it is flattened
//! into the `error` string and [`ErrorKind`] of the returned result record.
//!
//! `NotFound` is kept apart from `Runtime` so graders can tell a missing
//! function from one that threw.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static POSITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*at line (\d+), col(?:umn)? \d+\s*$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxError {
    /// The fragment is not syntactically valid.
    Compile { message: String, line: usize },
    /// An exception escaped the fragment or the invoked function.
    Runtime(String),
    /// The wall-clock bound or a timer ceiling was exceeded.
    Timeout(String),
    /// The requested function does not exist or is not callable.
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    CompileError,
    RuntimeError,
    TimeoutError,
    NotFoundError,
}

impl SandboxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SandboxError::Compile { .. } => ErrorKind::CompileError,
            SandboxError::Runtime(_) => ErrorKind::RuntimeError,
            SandboxError::Timeout(_) => ErrorKind::TimeoutError,
            SandboxError::NotFound(_) => ErrorKind::NotFoundError,
        }
    }

    pub(crate) fn not_found(name: &str) -> Self {
        SandboxError::NotFound(name.to_string())
    }

    pub(crate) fn timed_out(timeout_ms: u64) -> Self {
        SandboxError::Timeout(format!("Execution timed out after {timeout_ms}ms"))
    }

    /// Splits a parser diagnostic such as
    /// `SyntaxError: expected token ';' at line 2, col 5` into message and line.
    pub(crate) fn from_syntax(diagnostic: &str) -> Self {
        let message = diagnostic
            .trim()
            .strip_prefix("SyntaxError:")
            .unwrap_or(diagnostic)
            .trim();
        match POSITION.captures(message) {
            Some(caps) => {
                let line = caps[1].parse().unwrap_or(1);
                let start = caps.get(0).map_or(message.len(), |m| m.start());
                SandboxError::Compile {
                    message: message[..start].to_string(),
                    line,
                }
            }
            None => SandboxError::Compile {
                message: message.to_string(),
                line: 1,
            },
        }
    }
}

impl fmt::Display for SandboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SandboxError::Compile { message, line } => {
                write!(f, "SyntaxError: {message} (line {line})")
            }
            SandboxError::Runtime(message) | SandboxError::Timeout(message) => {
                write!(f, "{message}")
            }
            SandboxError::NotFound(name) => write!(f, "Function '{name}' not found"),
        }
    }
}

impl std::error::Error for SandboxError {}
