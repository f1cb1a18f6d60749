//! Timestamped ledger backups
//!
//! Before the ledger is rewritten, the current file is copied to
//! `<dir>/<prefix>_backup_<YYYYMMDD_HHMMSS>.<ext>`. Only the newest
//! `keep` copies survive; names sort chronologically so the oldest go
//! first.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Where and how backups of one ledger are kept
#[derive(Debug, Clone)]
pub struct BackupPolicy {
    pub dir: PathBuf,
    pub prefix: String,
    pub keep: usize,
}

impl BackupPolicy {
    fn marker(&self) -> String {
        format!("{}_backup_", self.prefix)
    }

    /// File name of the backup taken at `at`
    pub fn backup_name(&self, ledger_path: &Path, at: NaiveDateTime) -> String {
        let extension = ledger_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("xlsx");
        format!("{}{}.{}", self.marker(), at.format(TIMESTAMP_FORMAT), extension)
    }

    fn is_backup(&self, name: &str, extension: &str) -> bool {
        name.starts_with(&self.marker()) && name.ends_with(&format!(".{}", extension))
    }

    /// Existing backups of `ledger_path`, oldest first
    pub fn list(&self, ledger_path: &Path) -> Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let extension = ledger_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("xlsx");

        let mut backups: Vec<PathBuf> = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list backups in {:?}", self.dir))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(|name| self.is_backup(name, extension))
                    .unwrap_or(false)
            })
            .collect();
        backups.sort();
        Ok(backups)
    }

    /// Copy the ledger into the backup directory, then prune old copies.
    ///
    /// Returns the backup path, or `None` when there is no ledger yet.
    pub fn backup(&self, ledger_path: &Path) -> Result<Option<PathBuf>> {
        self.backup_at(ledger_path, Local::now().naive_local())
    }

    pub fn backup_at(&self, ledger_path: &Path, at: NaiveDateTime) -> Result<Option<PathBuf>> {
        if !ledger_path.exists() {
            return Ok(None);
        }

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create backup directory {:?}", self.dir))?;

        let backup_path = self.dir.join(self.backup_name(ledger_path, at));
        fs::copy(ledger_path, &backup_path)
            .with_context(|| format!("Failed to copy ledger to {:?}", backup_path))?;
        info!("Backup created: {:?}", backup_path);

        self.prune(ledger_path)?;
        Ok(Some(backup_path))
    }

    fn prune(&self, ledger_path: &Path) -> Result<()> {
        // The copy just taken always survives
        let keep = self.keep.max(1);
        let backups = self.list(ledger_path)?;
        if backups.len() <= keep {
            return Ok(());
        }

        for old in &backups[..backups.len() - keep] {
            fs::remove_file(old).with_context(|| format!("Failed to remove old backup {:?}", old))?;
            info!("Old backup removed: {:?}", old);
        }
        Ok(())
    }
}
