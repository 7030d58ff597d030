//! CLI error type.

use std::fmt;
use std::path::PathBuf;

use arbormap::config::ConfigError;
use arbormap::error::EngineError;
use arbormap::logging::LoggingError;

/// Errors surfaced by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be read, parsed or written.
    Config(String),

    /// Logging could not be initialized.
    Logging(LoggingError),

    /// A scenario file could not be read or parsed.
    Scenario { path: PathBuf, reason: String },

    /// The engine failed outside a scenario step.
    Engine(EngineError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Scenario { path, reason } => {
                write!(f, "Invalid scenario {}: {}", path.display(), reason)
            }
            CliError::Engine(e) => write!(f, "Engine error: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Logging(e) => Some(e),
            CliError::Engine(e) => Some(e),
            CliError::Config(_) | CliError::Scenario { .. } => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        CliError::Engine(e)
    }
}
