//! Run configuration
//!
//! Everything a run needs besides the export itself: where the ledger
//! lives, how backups are named and kept, and the positional layout of
//! the export document. Values come from an optional TOML file; every
//! field has a default so an empty file (or no file) is valid.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::ledger::backup::BackupPolicy;

const CONFIG_DIR: &str = "valorisation";
const CONFIG_FILENAME: &str = "config.toml";

/// Positional layout of the brokerage export.
///
/// The exporter writes the valuation date and the account totals on
/// fixed lines; the positions table is found by its header instead.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DocumentLayout {
    /// Zero-based line holding `Valorisation au;dd/mm/yyyy`
    pub date_line: usize,
    /// First zero-based line scanned for totals
    pub totals_first_line: usize,
    /// Last zero-based line scanned for totals (inclusive)
    pub totals_last_line: usize,
    /// Substring identifying the positions header line
    pub header_marker: String,
}

impl Default for DocumentLayout {
    fn default() -> Self {
        Self {
            date_line: 2,
            totals_first_line: 7,
            totals_last_line: 12,
            header_marker: "Valeur;Code Isin;Place de cotation".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Backup directory; relative paths hang off the ledger's directory
    pub dir: PathBuf,
    /// File name prefix, defaults to the ledger file stem
    pub prefix: Option<String>,
    /// Number of backups retained
    pub keep: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("Save"),
            prefix: None,
            keep: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ledger_path: PathBuf,
    pub backup: BackupConfig,
    pub layout: DocumentLayout,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ledger_path: PathBuf::from("EasyBourse.xlsx"),
            backup: BackupConfig::default(),
            layout: DocumentLayout::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.backup.keep == 0 {
            bail!("backup.keep must be at least 1");
        }
        if self.layout.totals_first_line > self.layout.totals_last_line {
            bail!(
                "layout.totals_first_line ({}) is after layout.totals_last_line ({})",
                self.layout.totals_first_line,
                self.layout.totals_last_line
            );
        }
        Ok(())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {:?}", path))?;
        let config = Self::from_toml_str(&text)
            .with_context(|| format!("Invalid configuration file {:?}", path))?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load from an explicit path, else from the user config directory
    /// when a file exists there, else fall back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Resolved backup directory for a given ledger path
    pub fn backup_dir_for(&self, ledger_path: &Path) -> PathBuf {
        if self.backup.dir.is_absolute() {
            return self.backup.dir.clone();
        }
        ledger_path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(&self.backup.dir)
    }

    /// Backup file prefix for a given ledger path
    pub fn backup_prefix_for(&self, ledger_path: &Path) -> String {
        self.backup.prefix.clone().unwrap_or_else(|| {
            ledger_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("ledger")
                .to_string()
        })
    }

    /// Backup policy for a given ledger path
    pub fn backup_policy_for(&self, ledger_path: &Path) -> BackupPolicy {
        BackupPolicy {
            dir: self.backup_dir_for(ledger_path),
            prefix: self.backup_prefix_for(ledger_path),
            keep: self.backup.keep,
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dir_spec::config_home().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILENAME))
}
