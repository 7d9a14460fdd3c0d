//! Command-line argument parsing for sqlharvest.
//!
//! The batch surface deliberately takes no flags: invoking the binary
//! processes every discovered query file with the configured defaults.
//! The interactive form lives behind a subcommand.

use clap::{Parser, Subcommand};

/// Batch SQL extraction to spreadsheets.
#[derive(Parser, Debug)]
#[command(name = "sqlharvest")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run every discovered query as a batch and exit (the default).
    Run,
    /// Open the interactive terminal form for selecting queries.
    Tui,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns true if the interactive form was requested.
    pub fn is_interactive(&self) -> bool {
        matches!(self.command, Some(Command::Tui))
    }
}
