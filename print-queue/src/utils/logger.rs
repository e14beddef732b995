//! Logging Infrastructure
//!
//! Structured logging with an env filter, optional JSON lines and an
//! optional daily rolling file.

use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize the logger with defaults (info, text, stdout)
pub fn init_logger() {
    init_logger_with_file(None, false, None);
}

/// Initialize the logger
///
/// `RUST_LOG` wins over `log_level` when set. File output is used only
/// when `log_dir` exists.
pub fn init_logger_with_file(log_level: Option<&str>, json: bool, log_dir: Option<&str>) {
    let level = log_level.unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    let file_appender = log_dir
        .map(Path::new)
        .filter(|p| p.exists())
        .map(|p| tracing_appender::rolling::daily(p, "print-queue"));

    // try_init: a second call (tests) keeps the first subscriber
    let _ = match (json, file_appender) {
        (true, Some(appender)) => subscriber.json().with_writer(appender).try_init(),
        (true, None) => subscriber.json().try_init(),
        (false, Some(appender)) => subscriber.with_ansi(false).with_writer(appender).try_init(),
        (false, None) => subscriber.try_init(),
    };
}
