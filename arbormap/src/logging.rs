//! Tracing subscriber setup.
//!
//! Console output goes to stderr so command output on stdout stays clean.
//! When a directory is configured, a second plain-text layer writes to a
//! daily-rolling file through a non-blocking writer.

use std::path::PathBuf;

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use tracing::info;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub use tracing_appender::non_blocking::WorkerGuard;

/// File name prefix for rolling log files.
pub const LOG_FILE_PREFIX: &str = "arbormap.log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{directive}': {reason}")]
    InvalidFilter { directive: String, reason: String },

    #[error("Failed to create log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("A global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info` or `arbormap=debug`.
    pub level: String,
    /// Directory for daily log files.
    pub directory: Option<PathBuf>,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Filter from `RUST_LOG`, falling back to the configured level.
    pub fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.level).map_err(|e| LoggingError::InvalidFilter {
                directive: self.level.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Install the global subscriber.
///
/// Returns the file writer's guard when file logging is enabled. Dropping it
/// flushes and stops the background writer, so hold it for the life of the
/// process.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = config.env_filter()?;

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(config.ansi)
        .with_timer(LocalTime::new(Rfc3339));

    let (file_layer, guard) = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|source| LoggingError::Directory {
                path: dir.clone(),
                source,
            })?;
            let (writer, guard) = non_blocking(rolling::daily(dir, LOG_FILE_PREFIX));
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(LocalTime::new(Rfc3339));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    info!(
        level = %config.level,
        directory = ?config.directory,
        "Logging initialized"
    );
    Ok(guard)
}
