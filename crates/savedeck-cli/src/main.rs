//! SaveDeck command line
//!
//! Mounts a save root, runs one command against it, and unmounts, writing
//! back any edited slot on the way out.
//!
//! Usage:
//!   savedeck --root ~/saves list
//!   savedeck --root ~/saves set Slot_0 gold 9999
//!   savedeck --root ~/saves check --all

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use savedeck_core::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "savedeck", version, about = "Inspect, validate, edit and back up save slots")]
pub struct Cli {
    /// Save root (overrides the config file and SAVEDECK_ROOT)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Config file (default: ./savedeck.json if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List every slot with a one-line summary
    List,
    /// Show every field of one slot
    Show {
        slot: String,
        /// Print the raw record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate every slot; exits non-zero when any slot has errors
    Check {
        /// Also list slots without problems
        #[arg(long)]
        all: bool,
    },
    /// Print one field (e.g. `gold`, `lastPos.x`)
    Get { slot: String, field: String },
    /// Set one field
    Set {
        slot: String,
        field: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    /// Create a new occupied slot
    New {
        slot: String,
        #[arg(long, default_value = "")]
        teleport: String,
        #[arg(long, default_value = "")]
        scene: String,
    },
    /// Read and edit flags
    Flag {
        #[command(subcommand)]
        action: FlagAction,
    },
    /// Snapshot a slot's files
    Backup { slot: String },
    /// List a slot's snapshots, oldest first
    Snapshots { slot: String },
    /// Replace a slot's files with a snapshot
    Restore { slot: String, snapshot: PathBuf },
}

#[derive(Debug, Subcommand)]
pub enum FlagAction {
    /// List all flags of a slot
    List { slot: String },
    /// Print one flag (`name` or `name.field`)
    Get { slot: String, path: String },
    /// Set a flag (`name` or `name.field`); the value is a literal
    Set {
        slot: String,
        path: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    /// Remove a flag or one field of an object flag
    Remove { slot: String, path: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Bootstrap: load config, mount the deck, run one command, shut down.
fn run(cli: Cli) -> Result<ExitCode, SaveError> {
    let mut config = DeckConfig::load(cli.config.as_deref())?;
    if let Some(root) = cli.root {
        config.save_root = root;
    }

    let mut deck = SaveDeck::mount(config)?;
    let code = commands::execute(&mut deck, cli.command)?;
    let report = deck.shutdown()?;
    for name in &report.flushed {
        log::info!("Wrote {name}");
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_set_with_global_root() {
        let cli = Cli::try_parse_from(["savedeck", "set", "Slot_0", "gold", "9999", "--root", "/s"])
            .unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/s")));
        assert!(matches!(
            cli.command,
            Command::Set { ref slot, ref field, ref value }
                if slot == "Slot_0" && field == "gold" && value == "9999"
        ));
    }

    #[test]
    fn negative_values_parse_as_values() {
        let cli = Cli::try_parse_from(["savedeck", "set", "s", "lastPos.x", "-3.5"]).unwrap();
        assert!(matches!(cli.command, Command::Set { ref value, .. } if value == "-3.5"));
    }

    #[test]
    fn parses_nested_flag_commands() {
        let cli = Cli::try_parse_from(["savedeck", "-vv", "flag", "set", "s", "gate.open", "true"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Command::Flag { action: FlagAction::Set { ref path, .. } } if path == "gate.open"
        ));
    }
}
