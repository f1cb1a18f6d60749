//! Historical valuation ledger
//!
//! The ledger is one flat table with a row per (date, instrument).
//! Rows are kept grouped by date in ascending order and, within a
//! date, ordered by instrument label. The account totals of a date are
//! repeated on every row of that date.
//!
//! The table is loaded from and stored to a spreadsheet by
//! [`xlsx`]; [`backup`] keeps timestamped copies of the previous file.

pub mod backup;
pub mod xlsx;

use chrono::NaiveDate;
use itertools::Itertools;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::models::{
    Position, Snapshot, TotalKind, Totals, COL_DATE, COL_ISIN, COL_LABEL, COL_VENUE,
    NUMERIC_COLUMNS, TEXT_COLUMNS,
};
use crate::utils::format_optional_euros;

/// Prefix of the placeholder headers spreadsheet tools give to
/// unnamed columns; such columns never carry ledger data.
const ARTIFACT_COLUMN_PREFIX: &str = "Unnamed";

/// A ledger cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(Decimal),
    Text(String),
    Date(NaiveDate),
}

impl Cell {
    pub fn from_decimal(value: Option<Decimal>) -> Self {
        value.map(Cell::Number).unwrap_or(Cell::Empty)
    }

    pub fn from_text(value: &str) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Cell::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Text shown for this cell, used to size spreadsheet columns
    pub fn display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(value) => value.normalize().to_string(),
            Cell::Text(text) => text.clone(),
            Cell::Date(date) => date.format("%d/%m/%Y").to_string(),
        }
    }
}

/// One ledger row: a position held on a date
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    pub date: NaiveDate,
    pub instrument: String,
    cells: HashMap<String, Cell>,
}

impl LedgerRow {
    pub fn new(date: NaiveDate, instrument: impl Into<String>) -> Self {
        Self {
            date,
            instrument: instrument.into(),
            cells: HashMap::new(),
        }
    }

    pub fn from_position(position: &Position) -> Self {
        let mut row = Self::new(position.date, position.label.clone());
        row.set(COL_ISIN, Cell::from_text(&position.isin));
        row.set(COL_VENUE, Cell::from_text(&position.venue));
        for column in NUMERIC_COLUMNS {
            row.set(column, Cell::from_decimal(position.numeric(column)));
        }
        for (name, value) in &position.extra {
            row.set(name, Cell::from_text(value));
        }
        row.set_totals(&position.totals);
        row
    }

    /// Value of a column; `Date` and `Valeur` come from the row key
    pub fn get(&self, column: &str) -> Cell {
        match column {
            COL_DATE => Cell::Date(self.date),
            COL_LABEL => Cell::Text(self.instrument.clone()),
            _ => self.cells.get(column).cloned().unwrap_or(Cell::Empty),
        }
    }

    pub fn set(&mut self, column: &str, value: Cell) {
        match column {
            COL_DATE | COL_LABEL => {}
            _ => {
                self.cells.insert(column.to_string(), value);
            }
        }
    }

    pub fn totals(&self) -> Totals {
        let mut totals = Totals::default();
        for kind in TotalKind::ALL {
            totals.set(kind, self.get(kind.label()).as_decimal());
        }
        totals
    }

    pub fn set_totals(&mut self, totals: &Totals) {
        for kind in TotalKind::ALL {
            self.set(kind.label(), Cell::from_decimal(totals.get(kind)));
        }
    }

    /// Overwrite every field the incoming row carries
    fn replace_with(&mut self, incoming: LedgerRow) {
        self.instrument = incoming.instrument;
        self.cells.extend(incoming.cells);
    }

    fn drop_columns(&mut self, predicate: impl Fn(&str) -> bool) {
        self.cells.retain(|column, _| !predicate(column.as_str()));
    }
}

/// Per-date view of the ledger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateSummary {
    pub date: NaiveDate,
    pub positions: usize,
    pub totals: Totals,
}

/// The accumulated valuation history
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ledger {
    columns: Vec<String>,
    rows: Vec<LedgerRow>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger from loaded parts. The key and totals columns are
    /// added when absent and the result is normalized.
    pub fn from_parts(columns: Vec<String>, rows: Vec<LedgerRow>) -> Self {
        let mut ledger = Self { columns, rows };
        ledger.ensure_column(COL_LABEL);
        ledger.ensure_column(COL_DATE);
        for kind in TotalKind::ALL {
            ledger.ensure_column(kind.label());
        }
        ledger.normalize();
        ledger
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[LedgerRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.rows.iter().any(|row| row.date == date)
    }

    pub fn rows_for(&self, date: NaiveDate) -> impl Iterator<Item = &LedgerRow> {
        self.rows.iter().filter(move |row| row.date == date)
    }

    pub fn find(&self, date: NaiveDate, instrument: &str) -> Option<&LedgerRow> {
        self.rows
            .iter()
            .find(|row| row.date == date && row.instrument == instrument)
    }

    /// Totals stored for a date, `None` when the date is not in the ledger
    pub fn totals_for(&self, date: NaiveDate) -> Option<Totals> {
        self.rows_for(date)
            .map(LedgerRow::totals)
            .reduce(|acc, totals| acc.or(totals))
    }

    pub fn date_summaries(&self) -> Vec<DateSummary> {
        self.rows
            .iter()
            .chunk_by(|row| row.date)
            .into_iter()
            .map(|(date, rows)| {
                let rows: Vec<&LedgerRow> = rows.collect();
                DateSummary {
                    date,
                    positions: rows.len(),
                    totals: rows
                        .iter()
                        .map(|row| row.totals())
                        .fold(Totals::default(), Totals::or),
                }
            })
            .collect()
    }

    /// Fold a snapshot into the ledger.
    ///
    /// Rows of a date the ledger does not hold yet are inserted before
    /// the first later date. For a known date each incoming row replaces
    /// the row with the same instrument, or is appended after the last
    /// row of that date. The date's totals are then rewritten on every
    /// row of the date; a total the snapshot lacks keeps its stored value.
    /// The ledger is finally re-sorted by (date, instrument).
    pub fn merge_snapshot(mut self, snapshot: &Snapshot) -> Ledger {
        for column in snapshot_columns(snapshot) {
            self.ensure_column(&column);
        }

        let incoming: Vec<LedgerRow> = snapshot
            .positions
            .iter()
            .map(LedgerRow::from_position)
            .collect();

        let dates: Vec<NaiveDate> = incoming.iter().map(|row| row.date).unique().collect();
        for date in dates {
            let rows: Vec<LedgerRow> = incoming
                .iter()
                .filter(|row| row.date == date)
                .cloned()
                .collect();
            self.merge_date(date, rows);
        }

        self.normalize();
        info!("Ledger holds {} rows after merge", self.rows.len());
        self
    }

    fn merge_date(&mut self, date: NaiveDate, rows: Vec<LedgerRow>) {
        let incoming_totals = rows.first().map(LedgerRow::totals).unwrap_or_default();
        let stored_totals = self.totals_for(date);

        if self.contains_date(date) {
            info!("Date {} already in ledger", date.format("%d/%m/%Y"));
            for row in rows {
                self.upsert(row);
            }
        } else {
            info!(
                "New date {}, adding {} rows",
                date.format("%d/%m/%Y"),
                rows.len()
            );
            let at = self
                .rows
                .iter()
                .position(|row| row.date > date)
                .unwrap_or(self.rows.len());
            let mut rows = rows.into_iter();
            if let Some(first) = rows.next() {
                self.rows.insert(at, first);
            }
            // Remaining rows go through the upsert path so a label
            // repeated in the same export cannot produce two rows.
            for row in rows {
                self.upsert(row);
            }
        }

        let totals = incoming_totals.or(stored_totals.unwrap_or_default());
        for kind in TotalKind::ALL {
            debug!(
                "  {} = {} for all rows of {}",
                kind.label(),
                format_optional_euros(totals.get(kind)),
                date
            );
        }
        for row in self.rows.iter_mut().filter(|row| row.date == date) {
            row.set_totals(&totals);
        }
    }

    fn upsert(&mut self, row: LedgerRow) {
        if let Some(existing) = self
            .rows
            .iter_mut()
            .find(|r| r.date == row.date && r.instrument == row.instrument)
        {
            info!("  Updating {}", row.instrument);
            existing.replace_with(row);
            return;
        }

        info!("  Adding {}", row.instrument);
        let at = self
            .rows
            .iter()
            .rposition(|r| r.date == row.date)
            .map(|idx| idx + 1)
            .unwrap_or(self.rows.len());
        self.rows.insert(at, row);
    }

    fn ensure_column(&mut self, column: &str) {
        if !self.columns.iter().any(|c| c == column) {
            self.columns.push(column.to_string());
        }
    }

    /// Sort by (date, instrument) and drop placeholder columns
    fn normalize(&mut self) {
        self.rows
            .sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.instrument.cmp(&b.instrument)));

        let is_artifact = |column: &str| column.trim().starts_with(ARTIFACT_COLUMN_PREFIX);
        if self.columns.iter().any(|c| is_artifact(c.as_str())) {
            debug!("Dropping placeholder columns");
            self.columns.retain(|c| !is_artifact(c.as_str()));
        }
        for row in &mut self.rows {
            row.drop_columns(is_artifact);
        }
    }
}

/// Ledger columns for a snapshot: the positions table, the date, then
/// the totals
fn snapshot_columns(snapshot: &Snapshot) -> Vec<String> {
    let mut columns: Vec<String> = TEXT_COLUMNS
        .iter()
        .chain(NUMERIC_COLUMNS.iter())
        .map(|c| c.to_string())
        .collect();
    for position in &snapshot.positions {
        for (name, _) in &position.extra {
            if !columns.contains(name) {
                columns.push(name.clone());
            }
        }
    }
    columns.push(COL_DATE.to_string());
    columns.extend(TotalKind::ALL.iter().map(|kind| kind.label().to_string()));
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn position(on: NaiveDate, label: &str, valuation: Decimal) -> Position {
        Position {
            date: on,
            label: label.to_string(),
            isin: format!("FR{}", label.len()),
            venue: "Euronext Paris".to_string(),
            quantity: Some(dec!(1)),
            price: Some(valuation),
            average_price: None,
            valuation: Some(valuation),
            gain_loss: None,
            performance_pct: None,
            weight_pct: None,
            totals: Totals::default(),
            extra: Vec::new(),
        }
    }

    fn snapshot(on: NaiveDate, labels: &[(&str, Decimal)], totals: Totals) -> Snapshot {
        let positions = labels
            .iter()
            .map(|(label, value)| Position {
                totals,
                ..position(on, label, *value)
            })
            .collect();
        Snapshot {
            date: on,
            positions,
            totals,
        }
    }

    fn totals(account: Decimal, cash: Decimal) -> Totals {
        Totals {
            positions_total: Some(account - cash),
            cash_balance: Some(cash),
            account_value: Some(account),
        }
    }

    fn labels(ledger: &Ledger) -> Vec<(NaiveDate, String)> {
        ledger
            .rows()
            .iter()
            .map(|r| (r.date, r.instrument.clone()))
            .collect()
    }

    #[test]
    fn test_merge_into_empty_ledger_sorts_by_label() {
        let d = date(2024, 3, 15);
        let snap = snapshot(
            d,
            &[("TOTALENERGIES", dec!(1202)), ("AIR LIQUIDE", dec!(1805))],
            totals(dec!(50000), dec!(5000)),
        );

        let ledger = Ledger::new().merge_snapshot(&snap);

        assert_eq!(
            labels(&ledger),
            vec![
                (d, "AIR LIQUIDE".to_string()),
                (d, "TOTALENERGIES".to_string())
            ]
        );
        for row in ledger.rows() {
            assert_eq!(row.totals().account_value, Some(dec!(50000)));
        }
        assert!(ledger.columns().contains(&"Valeur totale".to_string()));
        assert!(ledger.columns().contains(&COL_DATE.to_string()));
    }

    #[test]
    fn test_merge_same_date_updates_match_and_rebroadcasts_totals() {
        let d = date(2024, 3, 15);
        let first = snapshot(
            d,
            &[("AIR LIQUIDE", dec!(1805)), ("TOTALENERGIES", dec!(1202))],
            totals(dec!(50000), dec!(5000)),
        );
        let second = snapshot(d, &[("AIR LIQUIDE", dec!(1900))], totals(dec!(51000), dec!(4000)));

        let ledger = Ledger::new().merge_snapshot(&first).merge_snapshot(&second);

        assert_eq!(ledger.len(), 2);
        let air = ledger.find(d, "AIR LIQUIDE").unwrap();
        assert_eq!(air.get("Valorisation"), Cell::Number(dec!(1900)));

        let total = ledger.find(d, "TOTALENERGIES").unwrap();
        assert_eq!(total.get("Valorisation"), Cell::Number(dec!(1202)));
        assert_eq!(total.totals(), totals(dec!(51000), dec!(4000)));
        assert_eq!(air.totals(), totals(dec!(51000), dec!(4000)));
    }

    #[test]
    fn test_merge_same_date_new_instrument_is_inserted_in_order() {
        let d = date(2024, 3, 15);
        let first = snapshot(
            d,
            &[("AIR LIQUIDE", dec!(1)), ("TOTALENERGIES", dec!(2))],
            totals(dec!(10), dec!(1)),
        );
        let second = snapshot(d, &[("LVMH", dec!(3))], totals(dec!(13), dec!(1)));
        let later = snapshot(date(2024, 3, 16), &[("AIR LIQUIDE", dec!(1))], totals(dec!(9), dec!(1)));

        let ledger = Ledger::new()
            .merge_snapshot(&first)
            .merge_snapshot(&later)
            .merge_snapshot(&second);

        let names: Vec<String> = ledger.rows_for(d).map(|r| r.instrument.clone()).collect();
        assert_eq!(names, vec!["AIR LIQUIDE", "LVMH", "TOTALENERGIES"]);
        assert_eq!(ledger.rows().last().unwrap().date, date(2024, 3, 16));
        assert!(ledger
            .rows_for(d)
            .all(|r| r.totals().account_value == Some(dec!(13))));
    }

    #[test]
    fn test_dates_are_chronological_in_either_order() {
        let d1 = date(2024, 3, 14);
        let d2 = date(2024, 3, 15);
        let s1 = snapshot(d1, &[("ZODIAC", dec!(1)), ("AIR LIQUIDE", dec!(2))], totals(dec!(3), dec!(0)));
        let s2 = snapshot(d2, &[("BNP", dec!(4))], totals(dec!(4), dec!(0)));

        let forward = Ledger::new().merge_snapshot(&s1).merge_snapshot(&s2);
        let backward = Ledger::new().merge_snapshot(&s2).merge_snapshot(&s1);

        let expected = vec![
            (d1, "AIR LIQUIDE".to_string()),
            (d1, "ZODIAC".to_string()),
            (d2, "BNP".to_string()),
        ];
        assert_eq!(labels(&forward), expected);
        assert_eq!(labels(&backward), expected);
        assert_eq!(forward, backward);
        assert!(forward.contains_date(d1) && forward.contains_date(d2));
        assert!(!forward.contains_date(date(2024, 3, 16)));
    }

    #[test]
    fn test_new_date_between_existing_dates() {
        let ledger = Ledger::new()
            .merge_snapshot(&snapshot(date(2024, 1, 1), &[("A", dec!(1))], Totals::default()))
            .merge_snapshot(&snapshot(date(2024, 1, 3), &[("A", dec!(1))], Totals::default()))
            .merge_snapshot(&snapshot(date(2024, 1, 2), &[("B", dec!(1)), ("A", dec!(1))], Totals::default()));

        let dates: Vec<NaiveDate> = ledger.rows().iter().map(|r| r.date).collect();
        assert_eq!(
            dates,
            vec![
                date(2024, 1, 1),
                date(2024, 1, 2),
                date(2024, 1, 2),
                date(2024, 1, 3)
            ]
        );
    }

    #[test]
    fn test_absent_total_keeps_stored_value() {
        let d = date(2024, 3, 15);
        let first = snapshot(d, &[("A", dec!(1)), ("B", dec!(2))], totals(dec!(100), dec!(10)));
        let partial = Totals {
            account_value: Some(dec!(120)),
            ..Default::default()
        };
        let second = snapshot(d, &[("A", dec!(5))], partial);

        let ledger = Ledger::new().merge_snapshot(&first).merge_snapshot(&second);

        for row in ledger.rows() {
            assert_eq!(row.totals().account_value, Some(dec!(120)));
            assert_eq!(row.totals().cash_balance, Some(dec!(10)));
            assert_eq!(row.totals().positions_total, Some(dec!(90)));
        }
    }

    #[test]
    fn test_matched_row_gap_overwrites_stored_value() {
        let d = date(2024, 3, 15);
        let first = snapshot(d, &[("A", dec!(1))], Totals::default());
        let mut second = snapshot(d, &[("A", dec!(2))], Totals::default());
        second.positions[0].valuation = None;

        let ledger = Ledger::new().merge_snapshot(&first).merge_snapshot(&second);
        assert_eq!(ledger.find(d, "A").unwrap().get("Valorisation"), Cell::Empty);
    }

    #[test]
    fn test_duplicate_label_in_snapshot_collapses() {
        let d = date(2024, 3, 15);
        let snap = snapshot(d, &[("A", dec!(1)), ("A", dec!(2))], Totals::default());

        let ledger = Ledger::new().merge_snapshot(&snap);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.find(d, "A").unwrap().get("Valorisation"), Cell::Number(dec!(2)));
    }

    #[test]
    fn test_from_parts_drops_placeholder_columns_and_sorts() {
        let d = date(2024, 3, 15);
        let mut b = LedgerRow::new(d, "B");
        b.set("Unnamed: 0", Cell::Number(dec!(0)));
        let a = LedgerRow::new(d, "A");

        let ledger = Ledger::from_parts(
            vec!["Unnamed: 0".to_string(), "Valeur".to_string(), "Date".to_string()],
            vec![b, a],
        );

        assert!(!ledger.columns().iter().any(|c| c.starts_with("Unnamed")));
        assert!(ledger.columns().contains(&"Solde espèces".to_string()));
        assert_eq!(ledger.rows()[0].instrument, "A");
        assert_eq!(ledger.rows()[1].get("Unnamed: 0"), Cell::Empty);
    }

    #[test]
    fn test_date_summaries() {
        let ledger = Ledger::new()
            .merge_snapshot(&snapshot(date(2024, 1, 2), &[("A", dec!(1)), ("B", dec!(1))], totals(dec!(2), dec!(0))))
            .merge_snapshot(&snapshot(date(2024, 1, 1), &[("A", dec!(1))], totals(dec!(1), dec!(0))));

        let summaries = ledger.date_summaries();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].date, date(2024, 1, 1));
        assert_eq!(summaries[0].positions, 1);
        assert_eq!(summaries[1].positions, 2);
        assert_eq!(summaries[1].totals.account_value, Some(dec!(2)));
    }
}
