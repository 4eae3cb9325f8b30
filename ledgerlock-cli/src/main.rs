//! Ledgerlock CLI - concurrent account demonstrations in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod logging;
mod output;

use commands::config::{self, ConfigCommands};
use commands::run::{self as run_cmd, PhaseArg};

/// Ledgerlock - guarded accounts and deadlock-free transfers
#[derive(Parser)]
#[command(name = "ledgerlock", version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a demonstration phase
    Run {
        /// Phase to run
        #[arg(value_enum, ignore_case = true)]
        phase: PhaseArg,
        /// Concurrent callers for the single-account phases
        #[arg(long, env = "LEDGERLOCK_WORKERS")]
        workers: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect or create the settings file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run { phase, workers, json } => run_cmd::run(phase, workers, json),
        Commands::Config { command } => config::run(command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_flags() {
        let cli = Cli::try_parse_from(["ledgerlock", "-vv", "run", "Phase4", "--json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run { phase, json, .. } => {
                assert_eq!(phase, PhaseArg::Phase4);
                assert!(json);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_phase0_alias_selects_race() {
        let cli = Cli::try_parse_from(["ledgerlock", "run", "phase0"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Run { phase: PhaseArg::Race, .. }
        ));
    }

    #[test]
    fn test_unknown_phase_rejected() {
        assert!(Cli::try_parse_from(["ledgerlock", "run", "phase9"]).is_err());
    }

    #[test]
    fn test_config_init_force() {
        let cli = Cli::try_parse_from(["ledgerlock", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Init { force: true }
            }
        ));
    }
}
