//! File logging for the terminal viewer.
//!
//! The TUI owns stdout, so events go to `<directory>/<file>` only. The file
//! is truncated at startup. `RUST_LOG` overrides the configured level.

use crate::config::LoggingConfig;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keep alive for as long as events should reach the file
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Create the log directory and start from an empty file
pub fn prepare_log_file(config: &LoggingConfig) -> Result<PathBuf, io::Error> {
    fs::create_dir_all(&config.directory)?;
    let path = config.directory.join(&config.file);
    fs::write(&path, "")?;
    Ok(path)
}

/// `RUST_LOG` if set and valid, else the configured level
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, io::Error> {
    prepare_log_file(config)?;

    let file_appender = tracing_appender::rolling::never(&config.directory, &config.file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter(&config.level))
        .with(file_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
