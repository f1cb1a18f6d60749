//! Error handling for the valuation ledger
//!
//! Defines the structural failures the extractor and the ledger store
//! recognise, and establishes a unified Result type using anyhow for
//! context chaining and error propagation.

use thiserror::Error;

/// Core error types for extraction and ledger operations
#[derive(Error, Debug)]
pub enum ValorisationError {
    #[error("positions header not found (expected a line containing '{0}')")]
    HeaderNotFound(String),

    #[error("required column '{0}' missing")]
    MissingColumn(String),

    #[error("sheet '{0}' not found in workbook")]
    SheetNotFound(String),

    #[error("malformed ledger: {0}")]
    MalformedLedger(String),
}

/// Result type alias for valuation operations
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_formatting_is_readable() {
        let err = ValorisationError::HeaderNotFound("Valeur;Code Isin".to_string());
        assert_eq!(
            err.to_string(),
            "positions header not found (expected a line containing 'Valeur;Code Isin')"
        );
    }

    #[test]
    fn test_anyhow_context_chains_errors() {
        use anyhow::Context;
        let result: Result<()> = Err(ValorisationError::SheetNotFound("Data".to_string()).into());
        let result = result.context("failed to load ledger");
        match result {
            Err(e) => {
                assert!(e.to_string().contains("failed to load ledger"));
                let debug_msg = format!("{:?}", e);
                assert!(debug_msg.contains("sheet 'Data' not found"));
                assert!(e.downcast_ref::<ValorisationError>().is_some());
            }
            Ok(_) => panic!("expected error"),
        }
    }

    #[test]
    fn test_error_variants() {
        let err = ValorisationError::MalformedLedger("no Date column".to_string());
        assert!(err.to_string().starts_with("malformed ledger"));

        let err = ValorisationError::MissingColumn("Valeur".to_string());
        assert!(err.to_string().contains("Valeur"));
    }
}
