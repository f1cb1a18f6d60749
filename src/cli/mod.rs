use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod formatters;

#[derive(Parser)]
#[command(name = "valorisation")]
#[command(
    version,
    about = "Merge brokerage valuation exports into a historical ledger"
)]
#[command(
    long_about = "Parse the daily portfolio valuation CSV exported by the broker and fold it into a spreadsheet ledger holding one row per position and date, with account totals repeated on every row."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format (parse, sync, history, backups)
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Configuration file (defaults to <config dir>/valorisation/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge a valuation export into the ledger (backs up the ledger first)
    Sync {
        /// Path to the exported CSV file
        export: PathBuf,

        /// Ledger spreadsheet to update (overrides the configuration)
        #[arg(short, long)]
        ledger: Option<PathBuf>,

        /// Keep the export file after a successful merge
        #[arg(long)]
        keep_export: bool,

        /// Parse and merge without writing anything
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Parse a valuation export and show its content
    Parse {
        /// Path to the exported CSV file
        export: PathBuf,
    },

    /// Show one line per valuation date stored in the ledger
    History {
        /// Ledger spreadsheet (overrides the configuration)
        #[arg(short, long)]
        ledger: Option<PathBuf>,
    },

    /// List the ledger backups, newest first
    Backups {
        /// Ledger spreadsheet (overrides the configuration)
        #[arg(short, long)]
        ledger: Option<PathBuf>,
    },
}
