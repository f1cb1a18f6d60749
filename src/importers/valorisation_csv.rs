use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use csv::ReaderBuilder;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::config::DocumentLayout;
use crate::error::ValorisationError;
use crate::models::{
    Position, Snapshot, TotalKind, Totals, COL_AVERAGE_PRICE, COL_GAIN_LOSS, COL_ISIN, COL_LABEL,
    COL_PERFORMANCE, COL_PRICE, COL_QUANTITY, COL_VALUATION, COL_VENUE, COL_WEIGHT,
    NUMERIC_COLUMNS,
};
use crate::utils::{format_euros, parse_french_decimal};

static VALUATION_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Valorisation au;(\d{2}/\d{2}/\d{4})").expect("valuation date pattern is valid")
});

/// Parse a decoded valuation export into a [`Snapshot`].
///
/// Falls back to today's date when the valuation date line is missing.
pub fn parse_valorisation_text(content: &str, layout: &DocumentLayout) -> Result<Snapshot> {
    extract_snapshot(content, layout, Local::now().date_naive())
}

/// Same as [`parse_valorisation_text`] with an explicit fallback date.
///
/// Only a missing positions header is fatal. A missing date, a missing
/// or unreadable total and unreadable cells are logged and degrade to
/// `fallback_date`, an absent total and a gap respectively.
pub fn extract_snapshot(
    content: &str,
    layout: &DocumentLayout,
    fallback_date: NaiveDate,
) -> Result<Snapshot> {
    let lines: Vec<&str> = content.lines().collect();

    let date = match find_valuation_date(&lines, layout) {
        Some(date) => {
            info!("Valuation date: {}", date.format("%d/%m/%Y"));
            date
        }
        None => {
            warn!(
                "Valuation date not found on line {}, using {}",
                layout.date_line,
                fallback_date.format("%d/%m/%Y")
            );
            fallback_date
        }
    };

    let totals = find_totals(&lines, layout);

    let header_idx = lines
        .iter()
        .position(|line| line.contains(&layout.header_marker))
        .ok_or_else(|| ValorisationError::HeaderNotFound(layout.header_marker.clone()))?;
    debug!("Positions header on line {}", header_idx);

    let table: Vec<&str> = lines[header_idx..]
        .iter()
        .copied()
        .filter(|line| !line.trim().is_empty() && line.contains(';'))
        .collect();

    let positions = parse_positions_table(&table.join("\n"), date, totals)?;

    info!("Extracted {} positions", positions.len());
    let snapshot = Snapshot {
        date,
        positions,
        totals,
    };
    if !snapshot.positions.is_empty() {
        info!(
            "Computed positions valuation: {}",
            format_euros(snapshot.positions_valuation())
        );
        if let Some(total) = totals.positions_total {
            info!("Positions total from export: {}", format_euros(total));
        }
    }

    Ok(snapshot)
}

fn find_valuation_date(lines: &[&str], layout: &DocumentLayout) -> Option<NaiveDate> {
    let line = lines.get(layout.date_line)?;
    let captures = VALUATION_DATE.captures(line)?;
    let text = captures.get(1)?.as_str();
    match NaiveDate::parse_from_str(text, "%d/%m/%Y") {
        Ok(date) => Some(date),
        Err(e) => {
            warn!("Invalid valuation date '{}': {}", text, e);
            None
        }
    }
}

fn find_totals(lines: &[&str], layout: &DocumentLayout) -> Totals {
    let mut totals = Totals::default();

    info!("Extracting totals...");
    for idx in layout.totals_first_line..=layout.totals_last_line {
        let Some(line) = lines.get(idx) else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let mut parts = line.split(';');
        let label = parts.next().unwrap_or("").trim();
        let amount = parts.next().unwrap_or("").trim();
        if label.is_empty() {
            continue;
        }

        let Some(kind) = TotalKind::from_label(label) else {
            debug!("Ignoring line {} ('{}')", idx, label);
            continue;
        };

        match parse_french_decimal(amount, false) {
            Some(value) => {
                info!("  • {}: {}", label, format_euros(value));
                totals.set(kind, Some(value));
            }
            None => warn!("Could not convert amount for {}: '{}'", label, amount),
        }
    }

    totals
}

/// Column positions of the positions table, located by header name
#[derive(Debug)]
struct PositionColumns {
    label: usize,
    isin: Option<usize>,
    venue: Option<usize>,
    numeric: Vec<(&'static str, usize)>,
    extra: Vec<(String, usize)>,
}

impl PositionColumns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let mut label = None;
        let mut isin = None;
        let mut venue = None;
        let mut numeric = Vec::new();
        let mut extra = Vec::new();

        for (idx, header) in headers.iter().enumerate() {
            let name = header.trim();
            match name {
                "" => continue,
                COL_LABEL => label = Some(idx),
                COL_ISIN => isin = Some(idx),
                COL_VENUE => venue = Some(idx),
                _ => match NUMERIC_COLUMNS.iter().find(|col| **col == name) {
                    Some(col) => numeric.push((*col, idx)),
                    None => extra.push((name.to_string(), idx)),
                },
            }
        }

        Ok(Self {
            label: label.ok_or_else(|| ValorisationError::MissingColumn(COL_LABEL.to_string()))?,
            isin,
            venue,
            numeric,
            extra,
        })
    }
}

fn parse_positions_table(table: &str, date: NaiveDate, totals: Totals) -> Result<Vec<Position>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true) // Rows may be shorter than the header
        .from_reader(table.as_bytes());

    let headers = reader
        .headers()
        .context("Failed to read positions header")?
        .clone();
    let columns = PositionColumns::from_headers(&headers)?;
    debug!("Column mapping: {:?}", columns);

    let mut positions = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.context("Failed to read positions row")?;
        positions.push(parse_position(&record, &columns, date, totals, idx + 1));
    }

    Ok(positions)
}

fn parse_position(
    record: &csv::StringRecord,
    columns: &PositionColumns,
    date: NaiveDate,
    totals: Totals,
    row_num: usize,
) -> Position {
    let text = |idx: Option<usize>| {
        idx.and_then(|i| record.get(i))
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };

    let mut position = Position {
        date,
        label: text(Some(columns.label)),
        isin: text(columns.isin),
        venue: text(columns.venue),
        quantity: None,
        price: None,
        average_price: None,
        valuation: None,
        gain_loss: None,
        performance_pct: None,
        weight_pct: None,
        totals,
        extra: columns
            .extra
            .iter()
            .map(|(name, idx)| (name.clone(), text(Some(*idx))))
            .collect(),
    };

    for (column, idx) in &columns.numeric {
        let raw = record.get(*idx).unwrap_or("");
        let value = parse_french_decimal(raw, *column == COL_PERFORMANCE);
        if value.is_none() && !raw.trim().is_empty() {
            warn!(
                "Row {} ({}): could not convert {} '{}', leaving it empty",
                row_num, position.label, column, raw
            );
        }
        set_numeric(&mut position, column, value);
    }

    position
}

fn set_numeric(position: &mut Position, column: &str, value: Option<Decimal>) {
    match column {
        COL_QUANTITY => position.quantity = value,
        COL_PRICE => position.price = value,
        COL_AVERAGE_PRICE => position.average_price = value,
        COL_VALUATION => position.valuation = value,
        COL_GAIN_LOSS => position.gain_loss = value,
        COL_PERFORMANCE => position.performance_pct = value,
        COL_WEIGHT => position.weight_pct = value,
        _ => {}
    }
}
