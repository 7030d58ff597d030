//! Configuration management CLI commands.
//!
//! Provides `config get`, `config set`, `config list`, and `config path`
//! for viewing and modifying settings without editing the INI file by hand.

use std::path::Path;

use arbormap::config::{ConfigFile, ConfigKey};
use clap::Subcommand;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., map.focus_zoom)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key in format section.key (e.g., map.focus_zoom)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration settings
    List,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand against the file at `path`.
pub fn run(command: ConfigCommands, path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => run_get(&key, path),
        ConfigCommands::Set { key, value } => run_set(&key, &value, path),
        ConfigCommands::List => run_list(path),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'arbormap config list' to see available keys.",
            key
        ))
    })
}

fn run_get(key: &str, path: &Path) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let config = ConfigFile::load_from(path)?;
    let value = config_key.get(&config);

    if value.is_empty() {
        println!("(not set)");
    } else {
        println!("{}", value);
    }
    Ok(())
}

fn run_set(key: &str, value: &str, path: &Path) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    set_value(config_key, value, path)?;
    println!("Set {} = {}", config_key, value);
    Ok(())
}

/// Load, update one key and write back.
pub fn set_value(key: ConfigKey, value: &str, path: &Path) -> Result<ConfigFile, CliError> {
    let mut config = ConfigFile::load_from(path)?;
    key.set(&mut config, value)?;
    config.save_to(path)?;
    Ok(config)
}

fn run_list(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(path)?;

    println!("Configuration Settings");
    println!("======================");
    println!();

    let mut current_section = "";
    for key in ConfigKey::all() {
        let section = key.section();
        if section != current_section {
            if !current_section.is_empty() {
                println!();
            }
            println!("[{}]", section);
            current_section = section;
        }

        let value = key.get(&config);
        if value.is_empty() {
            println!("  {} = (not set)", key.key_name());
        } else {
            println!("  {} = {}", key.key_name(), value);
        }
    }
    Ok(())
}
