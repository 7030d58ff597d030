//! ArborMap CLI - Command-line interface
//!
//! Manages the configuration file and replays scripted annotation and
//! tracking sessions against a headless map surface.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;
use std::process::ExitCode;

use arbormap::config::config_file_path;
use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use error::CliError;
use runner::CliRunner;

#[derive(Debug, Parser)]
#[command(name = "arbormap", version, about = "Map annotation sync and location tracking")]
struct Cli {
    /// Path to config.ini (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// View or modify configuration settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Replay a JSON scenario against a headless map surface
    Replay {
        /// Scenario file
        scenario: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Config { command } => {
            let path = cli.config.unwrap_or_else(config_file_path);
            commands::config::run(command, &path)
        }
        Commands::Replay { scenario } => {
            let runner = CliRunner::new(cli.config.as_deref(), cli.verbose)?;
            runner.log_startup("replay");
            commands::replay::run(&scenario, runner.config().engine_config()).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_replay_with_global_flags() {
        let cli = Cli::try_parse_from(["arbormap", "replay", "walk.json", "--verbose"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Replay { ref scenario } if scenario == &PathBuf::from("walk.json")));
    }

    #[test]
    fn test_parse_config_set() {
        let cli = Cli::try_parse_from(["arbormap", "config", "set", "map.zoom", "12"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Set { .. }
            }
        ));
    }
}
