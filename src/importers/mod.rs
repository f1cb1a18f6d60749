// Import module - brokerage valuation export reader

pub mod valorisation_csv;

use anyhow::{anyhow, Context, Result};
use encoding_rs::WINDOWS_1252;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::config::DocumentLayout;
use crate::models::Snapshot;

pub use valorisation_csv::{extract_snapshot, parse_valorisation_text};

/// Read an export file and decode it from Windows-1252
pub fn read_export<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let bytes = fs::read(path).with_context(|| format!("Failed to read export {:?}", path))?;

    let (decoded, _, had_errors) = WINDOWS_1252.decode(&bytes);
    if had_errors {
        debug!("Export {:?} contained bytes outside Windows-1252", path);
    }
    Ok(decoded.into_owned())
}

/// Import a valuation snapshot from an export file (.csv or .txt)
pub fn import_snapshot<P: AsRef<Path>>(path: P, layout: &DocumentLayout) -> Result<Snapshot> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| anyhow!("File has no extension"))?
        .to_lowercase();

    info!("Importing valuation export: {:?} (type: {})", path, extension);

    match extension.as_str() {
        "csv" | "txt" => {
            let content = read_export(path)?;
            parse_valorisation_text(&content, layout)
                .with_context(|| format!("Failed to parse export {:?}", path))
        }
        _ => Err(anyhow!(
            "Unsupported file format: {}. Supported formats: .csv, .txt",
            extension
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_export_decodes_windows_1252() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("export.csv");
        // "Solde espèces" with è as the single byte 0xE8
        let mut bytes = b"Solde esp".to_vec();
        bytes.push(0xE8);
        bytes.extend_from_slice(b"ces;12,00");
        fs::write(&path, bytes).unwrap();

        assert_eq!(read_export(&path).unwrap(), "Solde espèces;12,00");
    }

    #[test]
    fn test_import_rejects_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("export.pdf");
        fs::write(&path, b"whatever").unwrap();

        let err = import_snapshot(&path, &DocumentLayout::default()).unwrap_err();
        assert!(err.to_string().contains("Unsupported file format"));
    }
}
