//! Tracing subscriber setup for processes that host the grading engine.
//!
//! Library crates only emit `tracing` events; the host decides where they go by
//! calling [`init_logging`] once at startup.

use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;

/// Installs a file layer (daily rolling, no ANSI) and, if configured, an ANSI
/// stdout layer. The filter comes from `LOG_LEVEL` when set, otherwise from
/// `config.log_level`.
///
/// Keep the returned guard alive for as long as logs should be flushed.
/// Calling this twice is harmless: the second subscriber is simply not installed.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let dir = Path::new(&config.log_dir);
    fs::create_dir_all(dir).ok();

    let file_appender = rolling::daily(dir, &config.log_file);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let env_filter = EnvFilter::try_from_env("LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    let installed = if config.log_to_stdout {
        let stdout_layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(true)
            .with_thread_ids(true);
        registry.with(stdout_layer).try_init().is_ok()
    } else {
        registry.try_init().is_ok()
    };

    if !installed {
        tracing::debug!("tracing subscriber already installed; keeping the existing one");
    }

    guard
}
