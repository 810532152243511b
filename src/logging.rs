//! Logging setup: stderr plus a daily-rolling file in `logs/`.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Guards that must be kept alive for the process lifetime so buffered
/// log lines are flushed on exit.
pub struct LoggingGuards {
    _guards: Vec<WorkerGuard>,
}

/// Initialize the tracing subscriber. Call once, before anything logs.
pub fn init_logging(log_dir: &Path) -> LoggingGuards {
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir).expect("Failed to create logs directory");
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "camwatch.log");
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(true),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global tracing subscriber");

    tracing::info!("Logging initialized at {:?}", log_dir);

    LoggingGuards {
        _guards: vec![file_guard],
    }
}
