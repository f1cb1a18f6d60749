//! Portfolio snapshot model
//!
//! One [`Snapshot`] is produced per export: a valuation date, the
//! positions held on that date and the account totals. Column names
//! are the ones the brokerage writes in its export and the ones kept
//! in the ledger spreadsheet.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

pub const COL_DATE: &str = "Date";
pub const COL_LABEL: &str = "Valeur";
pub const COL_ISIN: &str = "Code Isin";
pub const COL_VENUE: &str = "Place de cotation";
pub const COL_QUANTITY: &str = "Quantité";
pub const COL_PRICE: &str = "Cours";
pub const COL_AVERAGE_PRICE: &str = "Prix moyen";
pub const COL_VALUATION: &str = "Valorisation";
pub const COL_GAIN_LOSS: &str = "+/- value";
pub const COL_PERFORMANCE: &str = "Performance (%)";
pub const COL_WEIGHT: &str = "Poids";

/// Text columns of the positions table, in export order
pub const TEXT_COLUMNS: [&str; 3] = [COL_LABEL, COL_ISIN, COL_VENUE];

/// Numeric columns of the positions table, in export order
pub const NUMERIC_COLUMNS: [&str; 7] = [
    COL_QUANTITY,
    COL_PRICE,
    COL_AVERAGE_PRICE,
    COL_VALUATION,
    COL_GAIN_LOSS,
    COL_PERFORMANCE,
    COL_WEIGHT,
];

/// The three account-level amounts broadcast onto every row of a date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalKind {
    AccountValue,
    PositionsTotal,
    CashBalance,
}

impl TotalKind {
    /// Column order used when the ledger gains totals columns
    pub const ALL: [TotalKind; 3] = [
        TotalKind::AccountValue,
        TotalKind::PositionsTotal,
        TotalKind::CashBalance,
    ];

    /// Label as written in the export and as ledger column name
    pub fn label(&self) -> &'static str {
        match self {
            TotalKind::AccountValue => "Valeur totale",
            TotalKind::PositionsTotal => "Total positions sous dossier",
            TotalKind::CashBalance => "Solde espèces",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == label.trim())
    }

    pub fn is_total_column(column: &str) -> bool {
        Self::from_label(column).is_some()
    }
}

/// Account totals for one valuation date. Each one may be absent when
/// the export did not carry it or it could not be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub positions_total: Option<Decimal>,
    pub cash_balance: Option<Decimal>,
    pub account_value: Option<Decimal>,
}

impl Totals {
    pub fn get(&self, kind: TotalKind) -> Option<Decimal> {
        match kind {
            TotalKind::AccountValue => self.account_value,
            TotalKind::PositionsTotal => self.positions_total,
            TotalKind::CashBalance => self.cash_balance,
        }
    }

    pub fn set(&mut self, kind: TotalKind, value: Option<Decimal>) {
        match kind {
            TotalKind::AccountValue => self.account_value = value,
            TotalKind::PositionsTotal => self.positions_total = value,
            TotalKind::CashBalance => self.cash_balance = value,
        }
    }

    /// Fill totals missing here with the ones from `fallback`
    pub fn or(self, fallback: Totals) -> Totals {
        Totals {
            positions_total: self.positions_total.or(fallback.positions_total),
            cash_balance: self.cash_balance.or(fallback.cash_balance),
            account_value: self.account_value.or(fallback.account_value),
        }
    }

    pub fn is_empty(&self) -> bool {
        TotalKind::ALL.iter().all(|kind| self.get(*kind).is_none())
    }
}

/// One line of the positions table.
///
/// Numeric fields are `None` when the export cell was empty or could not
/// be read; consumers must treat that as a gap, not as zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub date: NaiveDate,
    pub label: String,
    pub isin: String,
    pub venue: String,
    pub quantity: Option<Decimal>,
    pub price: Option<Decimal>,
    pub average_price: Option<Decimal>,
    pub valuation: Option<Decimal>,
    pub gain_loss: Option<Decimal>,
    pub performance_pct: Option<Decimal>,
    pub weight_pct: Option<Decimal>,
    /// Account totals of the snapshot, repeated on every position
    pub totals: Totals,
    /// Columns the export carried that are not part of the known layout
    pub extra: Vec<(String, String)>,
}

impl Position {
    pub fn text(&self, column: &str) -> Option<&str> {
        match column {
            COL_LABEL => Some(&self.label),
            COL_ISIN => Some(&self.isin),
            COL_VENUE => Some(&self.venue),
            _ => None,
        }
    }

    pub fn numeric(&self, column: &str) -> Option<Decimal> {
        match column {
            COL_QUANTITY => self.quantity,
            COL_PRICE => self.price,
            COL_AVERAGE_PRICE => self.average_price,
            COL_VALUATION => self.valuation,
            COL_GAIN_LOSS => self.gain_loss,
            COL_PERFORMANCE => self.performance_pct,
            COL_WEIGHT => self.weight_pct,
            _ => None,
        }
    }
}

/// Full parsed output of one export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub date: NaiveDate,
    pub positions: Vec<Position>,
    pub totals: Totals,
}

impl Snapshot {
    /// Sum of the valuation column, ignoring gaps
    pub fn positions_valuation(&self) -> Decimal {
        self.positions.iter().filter_map(|p| p.valuation).sum()
    }
}
