//! Global application configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and mutation for testing or overrides in runtime environments.

use std::env;
use std::str::FromStr;
use std::sync::{OnceLock, RwLock};

/// Represents the complete application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    /// Wall-clock bound for a single script run or function invocation.
    pub sandbox_timeout_ms: u64,
    /// Hard ceiling on how many times one repeating timer may fire.
    pub max_timer_invocations: u32,
    /// Deepest chain of nested calls before a `RangeError`.
    pub max_call_depth: usize,
    /// Upper bound on submissions marked at the same time by `marker::mark_all`.
    pub max_concurrent_jobs: usize,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

/// Reads `key` and parses it, falling back to `default` when missing or malformed.
fn parsed_var<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// Every variable is optional; numeric values that fail to parse fall back
    /// to their defaults instead of aborting the process.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "code-grader".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "grader.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "false".into()) == "true",
            sandbox_timeout_ms: parsed_var("SANDBOX_TIMEOUT_MS", 500),
            max_timer_invocations: parsed_var("SANDBOX_MAX_TIMER_INVOCATIONS", 500),
            max_call_depth: parsed_var("SANDBOX_MAX_CALL_DEPTH", 10_000),
            max_concurrent_jobs: parsed_var("MARKER_MAX_CONCURRENT_JOBS", 4),
        }
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// # Panics
    /// Panics if the lock is poisoned.
    pub fn global() -> std::sync::RwLockReadGuard<'static, AppConfig> {
        CONFIG_INSTANCE
            .get_or_init(|| RwLock::new(AppConfig::from_env()))
            .read()
            .expect("Failed to acquire AppConfig read lock")
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        if let Some(lock) = CONFIG_INSTANCE.get() {
            if let Ok(mut guard) = lock.write() {
                *guard = AppConfig::from_env();
            }
        }
    }

    /// Generic internal setter for any field in the config.
    ///
    /// Used by public per-field setter methods.
    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = lock
            .write()
            .expect("Failed to acquire AppConfig write lock");
        setter(&mut guard);
    }

    // --- Per-field setters below ---

    pub fn set_env(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.env = value.into());
    }

    pub fn set_project_name(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.project_name = value.into());
    }

    pub fn set_log_level(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_level = value.into());
    }

    pub fn set_log_dir(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_dir = value.into());
    }

    pub fn set_log_file(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_file = value.into());
    }

    pub fn set_log_to_stdout(value: bool) {
        AppConfig::set_field(|cfg| cfg.log_to_stdout = value);
    }

    pub fn set_sandbox_timeout_ms(value: u64) {
        AppConfig::set_field(|cfg| cfg.sandbox_timeout_ms = value);
    }

    pub fn set_max_timer_invocations(value: u32) {
        AppConfig::set_field(|cfg| cfg.max_timer_invocations = value);
    }

    pub fn set_max_call_depth(value: usize) {
        AppConfig::set_field(|cfg| cfg.max_call_depth = value);
    }

    pub fn set_max_concurrent_jobs(value: usize) {
        AppConfig::set_field(|cfg| cfg.max_concurrent_jobs = value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_sandbox_vars() {
        unsafe {
            env::remove_var("SANDBOX_TIMEOUT_MS");
            env::remove_var("SANDBOX_MAX_TIMER_INVOCATIONS");
            env::remove_var("SANDBOX_MAX_CALL_DEPTH");
            env::remove_var("MARKER_MAX_CONCURRENT_JOBS");
        }
    }

    #[test]
    #[serial]
    fn defaults_apply_when_variables_are_missing() {
        clear_sandbox_vars();
        let cfg = AppConfig::from_env();
        assert_eq!(cfg.sandbox_timeout_ms, 500);
        assert_eq!(cfg.max_timer_invocations, 500);
        assert_eq!(cfg.max_call_depth, 10_000);
        assert_eq!(cfg.max_concurrent_jobs, 4);
    }

    #[test]
    #[serial]
    fn numeric_variables_are_parsed() {
        clear_sandbox_vars();
        unsafe {
            env::set_var("SANDBOX_TIMEOUT_MS", "250");
            env::set_var("SANDBOX_MAX_TIMER_INVOCATIONS", " 42 ");
        }
        let cfg = AppConfig::from_env();
        assert_eq!(cfg.sandbox_timeout_ms, 250);
        assert_eq!(cfg.max_timer_invocations, 42);
        clear_sandbox_vars();
    }

    #[test]
    #[serial]
    fn malformed_numbers_fall_back_to_defaults() {
        clear_sandbox_vars();
        unsafe {
            env::set_var("SANDBOX_MAX_CALL_DEPTH", "deep");
        }
        let cfg = AppConfig::from_env();
        assert_eq!(cfg.max_call_depth, 10_000);
        clear_sandbox_vars();
    }

    #[test]
    #[serial]
    fn setters_override_and_reset_restores() {
        clear_sandbox_vars();
        AppConfig::set_sandbox_timeout_ms(1234);
        assert_eq!(AppConfig::global().sandbox_timeout_ms, 1234);
        AppConfig::reset();
        assert_eq!(AppConfig::global().sandbox_timeout_ms, 500);
    }
}
