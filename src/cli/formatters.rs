//! Output formatting module for CLI display
//!
//! This module handles all terminal output formatting, separating
//! the concerns of parsing and merging from presentation.

use colored::Colorize;
use rust_decimal::Decimal;
use std::path::PathBuf;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};
use valorisation::ledger::DateSummary;
use valorisation::models::Snapshot;
use valorisation::sync::SyncReport;
use valorisation::utils::{format_decimal_fr, format_optional_euros};

/// Format a snapshot for JSON output
pub fn format_snapshot_json(snapshot: &Snapshot) -> String {
    serde_json::to_string_pretty(snapshot)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

fn colored_signed(value: Option<Decimal>, suffix: &str) -> String {
    match value {
        Some(v) if v >= Decimal::ZERO => format!("{}{}", format_decimal_fr(v), suffix)
            .green()
            .to_string(),
        Some(v) => format!("{}{}", format_decimal_fr(v), suffix).red().to_string(),
        None => "N/A".to_string(),
    }
}

/// Format a snapshot for terminal table output
pub fn format_snapshot_table(snapshot: &Snapshot) -> String {
    let mut output = format!(
        "\n{} Valuation on {}\n\n",
        "📊".cyan().bold(),
        snapshot.date.format("%d/%m/%Y")
    );

    #[derive(Tabled)]
    struct PositionRow {
        #[tabled(rename = "Valeur")]
        label: String,
        #[tabled(rename = "ISIN")]
        isin: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "Value")]
        valuation: String,
        #[tabled(rename = "+/-")]
        gain_loss: String,
        #[tabled(rename = "Perf %")]
        performance: String,
    }

    let rows: Vec<PositionRow> = snapshot
        .positions
        .iter()
        .map(|p| PositionRow {
            label: p.label.clone(),
            isin: p.isin.clone(),
            quantity: p
                .quantity
                .map(|q| q.normalize().to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            price: format_optional_euros(p.price),
            valuation: format_optional_euros(p.valuation),
            gain_loss: colored_signed(p.gain_loss, " €"),
            performance: colored_signed(p.performance_pct, "%"),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    // Right-align all columns except Valeur (0) and ISIN (1)
    table.modify(Columns::new(2..), Alignment::right());
    output.push_str(&table.to_string());

    output.push_str(&format!("\n\n{} Totals", "━".repeat(60).bright_black()));
    output.push_str(&format!(
        "\n{:<32} {}",
        "Total positions sous dossier:".bold(),
        format_optional_euros(snapshot.totals.positions_total)
    ));
    output.push_str(&format!(
        "\n{:<32} {}",
        "Solde espèces:".bold(),
        format_optional_euros(snapshot.totals.cash_balance)
    ));
    output.push_str(&format!(
        "\n{:<32} {}\n",
        "Valeur totale:".bold(),
        format_optional_euros(snapshot.totals.account_value)
    ));

    output
}

/// Format what a sync did, or would do on a dry run
pub fn format_sync_report(report: &SyncReport) -> String {
    let mut output = format!(
        "\n{} {} position(s) on {}\n",
        "📊".cyan().bold(),
        report.positions,
        report.date.format("%d/%m/%Y")
    );
    let verb = if report.written { "holds" } else { "would hold" };
    output.push_str(&format!(
        "{} Ledger {} {} row(s): {}\n",
        "📒".cyan().bold(),
        verb,
        report.ledger_rows,
        report.ledger_path.display()
    ));
    if let Some(backup) = &report.backup {
        output.push_str(&format!("{} Backup: {}\n", "💾".cyan().bold(), backup.display()));
    }
    output
}

pub fn format_sync_json(report: &SyncReport) -> String {
    serde_json::to_string_pretty(report)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

pub fn format_history_json(summaries: &[DateSummary]) -> String {
    serde_json::to_string_pretty(summaries)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

/// Backup paths as a JSON array, newest first
pub fn format_backups_json(backups: &[PathBuf]) -> String {
    let newest_first: Vec<&PathBuf> = backups.iter().rev().collect();
    serde_json::to_string_pretty(&newest_first)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

/// Format the per-date ledger history
pub fn format_history_table(summaries: &[DateSummary]) -> String {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Positions")]
        positions: usize,
        #[tabled(rename = "Positions total")]
        positions_total: String,
        #[tabled(rename = "Cash")]
        cash: String,
        #[tabled(rename = "Account value")]
        account_value: String,
    }

    let rows: Vec<HistoryRow> = summaries
        .iter()
        .map(|s| HistoryRow {
            date: s.date.format("%d/%m/%Y").to_string(),
            positions: s.positions,
            positions_total: format_optional_euros(s.totals.positions_total),
            cash: format_optional_euros(s.totals.cash_balance),
            account_value: format_optional_euros(s.totals.account_value),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::rounded());
    table.modify(Columns::new(1..), Alignment::right());
    format!("\n{} Ledger history\n\n{}\n", "📈".cyan().bold(), table)
}

/// Format the backup list, newest first
pub fn format_backups(backups: &[PathBuf]) -> String {
    if backups.is_empty() {
        return format!("{} No backups found\n", "ℹ".blue().bold());
    }

    let mut output = format!("{} {} backup(s):\n", "💾".cyan().bold(), backups.len());
    for path in backups.iter().rev() {
        output.push_str(&format!("  • {}\n", path.display()));
    }
    output
}

/// Format empty ledger message
pub fn format_empty_ledger() -> String {
    format!(
        "{} No ledger found\nMerge an export first using: {} sync <export.csv>\n",
        "ℹ".blue().bold(),
        "valorisation".bold()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use valorisation::models::{Position, Totals};

    fn snapshot() -> Snapshot {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let totals = Totals {
            positions_total: Some(dec!(45000)),
            cash_balance: None,
            account_value: Some(dec!(50000)),
        };
        Snapshot {
            date,
            positions: vec![Position {
                date,
                label: "AIR LIQUIDE".to_string(),
                isin: "FR0000120073".to_string(),
                venue: "Euronext Paris".to_string(),
                quantity: Some(dec!(10)),
                price: Some(dec!(180.5)),
                average_price: None,
                valuation: Some(dec!(1805)),
                gain_loss: Some(dec!(-12)),
                performance_pct: None,
                weight_pct: None,
                totals,
                extra: Vec::new(),
            }],
            totals,
        }
    }

    #[test]
    fn test_snapshot_table_lists_positions_and_totals() {
        colored::control::set_override(false);
        let text = format_snapshot_table(&snapshot());
        assert!(text.contains("15/03/2024"));
        assert!(text.contains("AIR LIQUIDE"));
        assert!(text.contains("1 805,00 €"));
        assert!(text.contains("-12,00 €"));
        assert!(text.contains("50 000,00 €"));
        assert!(text.contains("N/A"));
    }

    #[test]
    fn test_snapshot_json_keeps_gaps_as_null() {
        let json: serde_json::Value =
            serde_json::from_str(&format_snapshot_json(&snapshot())).unwrap();
        assert_eq!(json["date"], "2024-03-15");
        assert!(json["positions"][0]["performance_pct"].is_null());
        assert!(json["totals"]["cash_balance"].is_null());
    }

    #[test]
    fn test_empty_messages() {
        assert!(format_empty_ledger().contains("No ledger found"));
        assert!(format_backups(&[]).contains("No backups found"));
    }

    #[test]
    fn test_dry_run_report_says_would_hold() {
        colored::control::set_override(false);
        let report = SyncReport {
            date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            positions: 2,
            ledger_path: PathBuf::from("/data/EasyBourse.xlsx"),
            ledger_rows: 5,
            backup: None,
            written: false,
        };
        let text = format_sync_report(&report);
        assert!(text.contains("2 position(s) on 15/03/2024"));
        assert!(text.contains("Ledger would hold 5 row(s)"));
        assert!(!text.contains("Backup"));

        let json: serde_json::Value = serde_json::from_str(&format_sync_json(&report)).unwrap();
        assert_eq!(json["ledger_rows"], 5);
        assert_eq!(json["written"], false);
    }

    #[test]
    fn test_history_json_lists_dates() {
        let summaries = vec![DateSummary {
            date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            positions: 2,
            totals: Totals {
                account_value: Some(dec!(50000)),
                ..Default::default()
            },
        }];
        let json: serde_json::Value =
            serde_json::from_str(&format_history_json(&summaries)).unwrap();
        assert_eq!(json[0]["date"], "2024-03-15");
        assert_eq!(json[0]["positions"], 2);
        assert!(json[0]["totals"]["cash_balance"].is_null());
    }

    #[test]
    fn test_backups_newest_first() {
        let text = format_backups(&[
            PathBuf::from("Save/EasyBourse_backup_20240101_000000.xlsx"),
            PathBuf::from("Save/EasyBourse_backup_20240102_000000.xlsx"),
        ]);
        let newest = text.find("20240102").unwrap();
        let oldest = text.find("20240101").unwrap();
        assert!(newest < oldest);

        let json: serde_json::Value = serde_json::from_str(&format_backups_json(&[
            PathBuf::from("Save/EasyBourse_backup_20240101_000000.xlsx"),
            PathBuf::from("Save/EasyBourse_backup_20240102_000000.xlsx"),
        ]))
        .unwrap();
        assert_eq!(json[0], "Save/EasyBourse_backup_20240102_000000.xlsx");
    }
}
