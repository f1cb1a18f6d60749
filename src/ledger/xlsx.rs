//! Spreadsheet persistence of the ledger
//!
//! The ledger lives in the `Data` sheet of an .xlsx workbook, header on
//! the first row. Loading goes through calamine, storing through
//! rust_xlsxwriter into a temporary sibling file renamed over the
//! destination once complete.

use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook, Data, DataType, Reader, Xlsx};
use chrono::{Datelike, NaiveDate};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_xlsxwriter::{Color, ExcelDateTime, Format, Workbook, Worksheet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{Cell, Ledger, LedgerRow};
use crate::error::ValorisationError;
use crate::models::{TotalKind, COL_DATE, COL_LABEL};

pub const SHEET_NAME: &str = "Data";

const MAX_COLUMN_WIDTH: usize = 50;
const TOTALS_FILL: u32 = 0xE6F3FF;

/// Load the ledger from `path`, or an empty ledger when the file does
/// not exist yet.
pub fn load_or_new<P: AsRef<Path>>(path: P) -> Result<Ledger> {
    let path = path.as_ref();
    if path.exists() {
        load_ledger(path)
    } else {
        info!("No ledger at {:?}, starting a new one", path);
        Ok(Ledger::new())
    }
}

/// Load the ledger from the `Data` sheet of an .xlsx workbook
pub fn load_ledger<P: AsRef<Path>>(path: P) -> Result<Ledger> {
    let path = path.as_ref();
    let mut workbook: Xlsx<_> =
        open_workbook(path).with_context(|| format!("Failed to open ledger {:?}", path))?;

    if !workbook.sheet_names().iter().any(|name| name == SHEET_NAME) {
        return Err(ValorisationError::SheetNotFound(SHEET_NAME.to_string()).into());
    }

    let range = workbook
        .worksheet_range(SHEET_NAME)
        .context("Failed to read ledger worksheet")?;

    let mut rows_iter = range.rows();
    let columns: Vec<String> = match rows_iter.next() {
        Some(header) => header.iter().map(|cell| cell.to_string().trim().to_string()).collect(),
        None => {
            info!("Ledger {:?} is empty", path);
            return Ok(Ledger::new());
        }
    };
    debug!("Ledger columns: {:?}", columns);

    let date_idx = column_index(&columns, COL_DATE)?;
    let label_idx = column_index(&columns, COL_LABEL)?;

    let mut rows = Vec::new();
    for (idx, row) in rows_iter.enumerate() {
        if row.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        let row_num = idx + 2;

        let date_cell = row.get(date_idx).unwrap_or(&Data::Empty);
        let date = parse_date(date_cell).ok_or_else(|| {
            ValorisationError::MalformedLedger(format!(
                "row {}: unreadable date '{}'",
                row_num, date_cell
            ))
        })?;
        let instrument = row
            .get(label_idx)
            .map(|cell| cell.to_string().trim().to_string())
            .unwrap_or_default();

        let mut ledger_row = LedgerRow::new(date, instrument);
        for (col, name) in columns.iter().enumerate() {
            if col == date_idx || col == label_idx || name.is_empty() {
                continue;
            }
            ledger_row.set(name, to_cell(row.get(col).unwrap_or(&Data::Empty)));
        }
        rows.push(ledger_row);
    }

    let columns = columns.into_iter().filter(|name| !name.is_empty()).collect();
    let ledger = Ledger::from_parts(columns, rows);
    info!("Loaded ledger {:?}: {} rows", path, ledger.len());
    Ok(ledger)
}

fn column_index(columns: &[String], name: &str) -> Result<usize> {
    columns.iter().position(|c| c == name).ok_or_else(|| {
        ValorisationError::MalformedLedger(format!("missing '{}' column", name)).into()
    })
}

fn parse_date(cell: &Data) -> Option<NaiveDate> {
    match cell {
        Data::DateTime(dt) => from_serial(dt.as_f64()),
        // Date cells saved without a date format come back as serials
        Data::Float(f) => from_serial(*f),
        Data::Int(i) => from_serial(*i as f64),
        Data::DateTimeIso(text) | Data::String(text) => {
            let text = text.trim();
            // ISO values may carry a time part
            let date_part = text.split(['T', ' ']).next().unwrap_or(text);
            NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(text, "%d/%m/%Y"))
                .ok()
        }
        _ => None,
    }
}

fn from_serial(serial: f64) -> Option<NaiveDate> {
    let days_since_epoch = serial.floor() as i64;
    NaiveDate::from_ymd_opt(1899, 12, 30)?
        .checked_add_signed(chrono::Duration::days(days_since_epoch))
}

fn to_cell(cell: &Data) -> Cell {
    match cell {
        Data::Int(i) => Cell::Number(Decimal::from(*i)),
        Data::Float(f) => Decimal::from_f64(*f)
            .map(Cell::Number)
            .unwrap_or(Cell::Empty),
        Data::String(s) => Cell::from_text(s.trim()),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(_) | Data::DateTimeIso(_) => {
            parse_date(cell).map(Cell::Date).unwrap_or(Cell::Empty)
        }
        Data::DurationIso(s) => Cell::from_text(s),
        _ => Cell::Empty,
    }
}

/// Write the ledger to `path`, replacing any previous file.
///
/// The workbook is first saved next to the destination and renamed
/// over it, so a failure leaves the previous ledger untouched.
pub fn store_ledger<P: AsRef<Path>>(ledger: &Ledger, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("Saving ledger to {:?}", path);

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;
    write_sheet(worksheet, ledger)?;

    let tmp_path = temporary_path(path);
    workbook
        .save(&tmp_path)
        .with_context(|| format!("Failed to write ledger {:?}", tmp_path))?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        if let Err(cleanup) = fs::remove_file(&tmp_path) {
            warn!("Could not remove {:?}: {}", tmp_path, cleanup);
        }
        return Err(anyhow::Error::new(e).context(format!("Failed to replace ledger {:?}", path)));
    }

    info!("Ledger saved: {} rows", ledger.len());
    Ok(())
}

fn temporary_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("ledger.xlsx");
    // Keep the .xlsx extension last
    path.with_file_name(format!(".tmp-{}", file_name))
}

fn write_sheet(worksheet: &mut Worksheet, ledger: &Ledger) -> Result<()> {
    let totals_fill = Format::new().set_background_color(Color::RGB(TOTALS_FILL));
    let totals_header = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(TOTALS_FILL));
    let date_format = Format::new().set_num_format("dd/mm/yyyy");
    let totals_date_format = date_format
        .clone()
        .set_background_color(Color::RGB(TOTALS_FILL));

    for (col, name) in ledger.columns().iter().enumerate() {
        let col_num = u16::try_from(col).context("Too many ledger columns")?;
        let is_total = TotalKind::is_total_column(name);

        if is_total {
            worksheet.write_string_with_format(0, col_num, name, &totals_header)?;
        } else {
            worksheet.write_string(0, col_num, name)?;
        }

        let mut width = name.chars().count();
        for (idx, row) in ledger.rows().iter().enumerate() {
            let row_num = u32::try_from(idx + 1).context("Too many ledger rows")?;
            let cell = row.get(name);
            width = width.max(cell.display().chars().count());

            match (&cell, is_total) {
                (Cell::Empty, true) => {
                    worksheet.write_blank(row_num, col_num, &totals_fill)?;
                }
                (Cell::Empty, false) => {}
                (Cell::Number(value), _) => {
                    let value = value
                        .to_f64()
                        .ok_or_else(|| anyhow!("Amount {} does not fit a spreadsheet number", value))?;
                    if is_total {
                        worksheet.write_number_with_format(row_num, col_num, value, &totals_fill)?;
                    } else {
                        worksheet.write_number(row_num, col_num, value)?;
                    }
                }
                (Cell::Text(text), _) => {
                    if is_total {
                        worksheet.write_string_with_format(row_num, col_num, text, &totals_fill)?;
                    } else {
                        worksheet.write_string(row_num, col_num, text)?;
                    }
                }
                (Cell::Date(date), _) => {
                    let datetime = excel_date(*date)?;
                    let format = if is_total { &totals_date_format } else { &date_format };
                    worksheet.write_datetime_with_format(row_num, col_num, &datetime, format)?;
                }
            }
        }

        worksheet.set_column_width(col_num, (width + 2).min(MAX_COLUMN_WIDTH) as f64)?;
    }

    Ok(())
}

fn excel_date(date: NaiveDate) -> Result<ExcelDateTime> {
    let year = u16::try_from(date.year()).context("Date before year 0")?;
    ExcelDateTime::from_ymd(year, date.month() as u8, date.day() as u8)
        .with_context(|| format!("Date {} out of spreadsheet range", date))
}
