//! Valorisation - brokerage valuation ledger
//!
//! This library parses the daily valuation CSV exported by the broker
//! and merges it into a historical spreadsheet ledger, one row per
//! position and date, with the account totals repeated on every row.

pub mod config;
pub mod error;
pub mod importers;
pub mod ledger;
pub mod models;
pub mod sync;
pub mod utils;
