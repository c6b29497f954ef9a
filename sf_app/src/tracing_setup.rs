use std::io;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Initialise tracing with an hourly rolling file and stderr
///
/// Stdout is left to the records themselves. The returned guard flushes the
/// file writer on drop and must live as long as the application.
pub fn init(app_name: &str, log_dir: &str, default_level: Level) -> WorkerGuard {
    let _ = std::fs::create_dir_all(log_dir);

    // File appender (non-blocking)
    let file_appender = tracing_appender::rolling::hourly(log_dir, format!("{app_name}.log"));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Respects RUST_LOG, falls back to default_level
    let env_filter = EnvFilter::builder().with_default_directive(default_level.into()).from_env_lossy();

    let file_layer =
        fmt::layer().with_writer(non_blocking).with_target(true).with_thread_ids(true).with_line_number(true).with_ansi(false).compact();

    let stderr_layer = fmt::layer().with_writer(io::stderr).with_target(true).with_thread_names(true).with_ansi(true).compact();

    tracing_subscriber::registry().with(env_filter).with(file_layer).with(stderr_layer).init();

    guard
}
