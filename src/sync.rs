//! One valuation run: export in, ledger updated
//!
//! extract → backup → load → merge → store → remove export. Every
//! failure stops the run before the ledger is written; `run_sync`
//! turns the outcome into a success flag after logging the error chain.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::importers;
use crate::ledger::xlsx;

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Ledger to update instead of the configured one
    pub ledger_path: Option<PathBuf>,
    /// Leave the export file in place after a successful run
    pub keep_export: bool,
    /// Parse and merge in memory only
    pub dry_run: bool,
}

/// What a successful run did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub date: NaiveDate,
    pub positions: usize,
    pub ledger_path: PathBuf,
    pub ledger_rows: usize,
    pub backup: Option<PathBuf>,
    pub written: bool,
}

/// Run a sync and report success as a flag. Errors are logged, never
/// returned.
pub fn run_sync(export: &Path, config: &Config, options: &SyncOptions) -> bool {
    run_sync_report(export, config, options).is_some()
}

/// Same as [`run_sync`], handing back the report of a successful run
pub fn run_sync_report(
    export: &Path,
    config: &Config,
    options: &SyncOptions,
) -> Option<SyncReport> {
    match sync(export, config, options) {
        Ok(report) => {
            if report.written {
                info!(
                    "Sync complete: {} positions on {} merged, ledger has {} rows",
                    report.positions,
                    report.date.format("%d/%m/%Y"),
                    report.ledger_rows
                );
            } else {
                info!(
                    "Dry run: {} positions on {} would leave {} ledger rows",
                    report.positions,
                    report.date.format("%d/%m/%Y"),
                    report.ledger_rows
                );
            }
            Some(report)
        }
        Err(e) => {
            error!("Sync failed: {:?}", e);
            None
        }
    }
}

/// Fold one export into the ledger
pub fn sync(export: &Path, config: &Config, options: &SyncOptions) -> Result<SyncReport> {
    let ledger_path = resolve_ledger_path(
        options
            .ledger_path
            .as_deref()
            .unwrap_or(config.ledger_path.as_path()),
    )?;
    info!("Target ledger: {:?}", ledger_path);

    let snapshot = importers::import_snapshot(export, &config.layout)?;

    let backup = if options.dry_run {
        None
    } else {
        config
            .backup_policy_for(&ledger_path)
            .backup(&ledger_path)
            .context("Failed to back up ledger")?
    };

    let ledger = xlsx::load_or_new(&ledger_path)?.merge_snapshot(&snapshot);

    if options.dry_run {
        info!("Dry run: ledger {:?} left untouched", ledger_path);
    } else {
        xlsx::store_ledger(&ledger, &ledger_path)?;
        if !options.keep_export {
            remove_export(export);
        }
    }

    Ok(SyncReport {
        date: snapshot.date,
        positions: snapshot.positions.len(),
        ledger_path,
        ledger_rows: ledger.len(),
        backup,
        written: !options.dry_run,
    })
}

pub fn resolve_ledger_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(cwd.join(path))
}

fn remove_export(export: &Path) {
    match fs::remove_file(export) {
        Ok(()) => info!("Export removed: {:?}", export),
        Err(e) => warn!("Could not remove export {:?}: {}", export, e),
    }
}
