//! Resource limits applied to every sandboxed run.
//!
//! Limits can come from three places: the built-in defaults, the global
//! [`AppConfig`](crate::config::AppConfig), or a JSON document shipped with an
//! exercise. Missing JSON fields fall back to the defaults.

use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

/// Loop iterations granted per millisecond of wall-clock budget.
const LOOP_ITERATIONS_PER_MS: u64 = 20_000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExecutionLimits {
    /// Wall-clock bound for one script run or one function invocation.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// How many times a single repeating timer may fire before the run is
    /// aborted as a timeout.
    #[serde(default = "default_max_timer_invocations")]
    pub max_timer_invocations: u32,

    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_timer_invocations: default_max_timer_invocations(),
            max_call_depth: default_max_call_depth(),
        }
    }
}

impl ExecutionLimits {
    /// Builds limits from the process-wide configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            timeout_ms: config.sandbox_timeout_ms,
            max_timer_invocations: config.max_timer_invocations,
            max_call_depth: config.max_call_depth,
        }
    }

    /// Parses limits from JSON, e.g. `{"timeout_ms": 200}`.
    pub fn from_json_str(raw: &str) -> Result<Self, String> {
        serde_json::from_str(raw).map_err(|e| format!("Invalid execution limits JSON: {e}"))
    }

    /// Iterations one loop may run before it is treated as a runaway.
    ///
    /// Scales with the timeout so a spinning fragment stops on its own shortly
    /// after the caller has stopped waiting for it.
    pub fn loop_iteration_budget(&self) -> u64 {
        self.timeout_ms.max(1).saturating_mul(LOOP_ITERATIONS_PER_MS)
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_timer_invocations(mut self, max: u32) -> Self {
        self.max_timer_invocations = max;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }
}

//Default Functions

fn default_timeout_ms() -> u64 {
    500
}

fn default_max_timer_invocations() -> u32 {
    500
}

fn default_max_call_depth() -> usize {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults_for_missing_fields() {
        let limits = ExecutionLimits::from_json_str(r#"{"timeout_ms": 200}"#).unwrap();
        assert_eq!(limits.timeout_ms, 200);
        assert_eq!(limits.max_timer_invocations, 500);
        assert_eq!(limits.max_call_depth, 10_000);
    }

    #[test]
    fn invalid_json_is_reported() {
        let err = ExecutionLimits::from_json_str("{timeout").unwrap_err();
        assert!(err.starts_with("Invalid execution limits JSON"));
    }

    #[test]
    fn builders_override_single_fields() {
        let limits = ExecutionLimits::default()
            .with_timeout_ms(50)
            .with_max_timer_invocations(3)
            .with_max_call_depth(64);
        assert_eq!(limits.timeout_ms, 50);
        assert_eq!(limits.max_timer_invocations, 3);
        assert_eq!(limits.max_call_depth, 64);
    }

    #[test]
    fn loop_budget_follows_the_timeout() {
        let short = ExecutionLimits::default().with_timeout_ms(50);
        let long = ExecutionLimits::default().with_timeout_ms(500);
        assert_eq!(long.loop_iteration_budget(), 10 * short.loop_iteration_budget());
        assert!(ExecutionLimits::default().with_timeout_ms(0).loop_iteration_budget() > 0);
    }
}
