mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{formatters, Cli, Commands};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;
use valorisation::config::Config;
use valorisation::importers;
use valorisation::ledger::xlsx;
use valorisation::sync::{self, SyncOptions};

fn main() -> ExitCode {
    // Initialize logging; stdout stays free for command output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Sync {
            export,
            ledger,
            keep_export,
            dry_run,
        } => {
            let options = SyncOptions {
                ledger_path: ledger,
                keep_export,
                dry_run,
            };
            Ok(handle_sync(&export, &config, &options, cli.json))
        }

        Commands::Parse { export } => {
            let snapshot = importers::import_snapshot(&export, &config.layout)?;
            if cli.json {
                println!("{}", formatters::format_snapshot_json(&snapshot));
            } else {
                println!("{}", formatters::format_snapshot_table(&snapshot));
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::History { ledger } => {
            let ledger_path = ledger_path(ledger, &config)?;
            if !ledger_path.exists() {
                if cli.json {
                    println!("[]");
                    return Ok(ExitCode::SUCCESS);
                }
                print!("{}", formatters::format_empty_ledger());
                return Ok(ExitCode::SUCCESS);
            }
            let summaries = xlsx::load_ledger(&ledger_path)?.date_summaries();
            if cli.json {
                println!("{}", formatters::format_history_json(&summaries));
            } else {
                print!("{}", formatters::format_history_table(&summaries));
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Backups { ledger } => {
            let ledger_path = ledger_path(ledger, &config)?;
            let backups = config.backup_policy_for(&ledger_path).list(&ledger_path)?;
            if cli.json {
                println!("{}", formatters::format_backups_json(&backups));
            } else {
                print!("{}", formatters::format_backups(&backups));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn ledger_path(explicit: Option<PathBuf>, config: &Config) -> Result<PathBuf> {
    sync::resolve_ledger_path(explicit.as_deref().unwrap_or(config.ledger_path.as_path()))
}

/// Handle sync command
fn handle_sync(export: &Path, config: &Config, options: &SyncOptions, json: bool) -> ExitCode {
    info!("Merging valuation export: {:?}", export);

    let Some(report) = sync::run_sync_report(export, config, options) else {
        println!("\n{} Sync failed, ledger left unchanged", "✗".red().bold());
        return ExitCode::FAILURE;
    };

    if json {
        println!("{}", formatters::format_sync_json(&report));
        return ExitCode::SUCCESS;
    }

    print!("{}", formatters::format_sync_report(&report));
    if options.dry_run {
        println!("\n{} Dry run - no changes saved", "ℹ".blue().bold());
    } else {
        println!("\n{} Ledger updated", "✓".green().bold());
    }
    ExitCode::SUCCESS
}
