//! Shared command setup: configuration loading and logging.

use std::path::{Path, PathBuf};

use arbormap::config::{config_file_path, ConfigFile};
use arbormap::logging::{init_logging, WorkerGuard};
use tracing::info;

use crate::error::CliError;

/// Loaded configuration plus the logging guard.
pub struct CliRunner {
    config: ConfigFile,
    config_path: PathBuf,
    _log_guard: Option<WorkerGuard>,
}

impl CliRunner {
    /// Load configuration from `config_path` (or the default location) and
    /// install logging.
    pub fn new(config_path: Option<&Path>, verbose: bool) -> Result<Self, CliError> {
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(config_file_path);
        let config = ConfigFile::load_from(&config_path)?;

        let mut logging = config.logging_config();
        if verbose {
            logging.level = "debug".to_string();
        }
        let guard = init_logging(&logging)?;

        Ok(Self {
            config,
            config_path,
            _log_guard: guard,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn log_startup(&self, command: &str) {
        info!(
            command,
            version = env!("CARGO_PKG_VERSION"),
            config = %self.config_path.display(),
            "arbormap starting"
        );
    }
}
