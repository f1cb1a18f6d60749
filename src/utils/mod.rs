//! Number parsing and formatting for the French export conventions
//!
//! The brokerage export writes amounts with a comma decimal separator
//! and space-separated thousands ("1 234,56"), and percentages with a
//! trailing sign ("12,3%"). This module centralizes reading those
//! values and rendering amounts back the same way for terminal output.

use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse an amount written with French conventions.
///
/// Spaces (including non-breaking ones) are dropped, the decimal comma
/// becomes a dot. When `strip_percent` is set a single trailing `%` is
/// removed first. Returns `None` for anything that still isn't a number,
/// empty cells included: a missing value is never silently zero.
///
/// # Examples
/// ```
/// use valorisation::utils::parse_french_decimal;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(parse_french_decimal("1 234,56", false), Some(dec!(1234.56)));
/// assert_eq!(parse_french_decimal("12,3%", true), Some(dec!(12.3)));
/// assert_eq!(parse_french_decimal("n/a", false), None);
/// ```
pub fn parse_french_decimal(text: &str, strip_percent: bool) -> Option<Decimal> {
    let mut cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}'))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    if strip_percent && cleaned.ends_with('%') {
        cleaned.pop();
    }

    if cleaned.is_empty() {
        return None;
    }

    Decimal::from_str(&cleaned).ok()
}

/// Format a value with French conventions: space thousands separator,
/// comma decimal separator, two decimals.
///
/// # Examples
/// ```
/// use valorisation::utils::format_decimal_fr;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_decimal_fr(dec!(1234.56)), "1 234,56");
/// assert_eq!(format_decimal_fr(dec!(-500)), "-500,00");
/// ```
pub fn format_decimal_fr(value: Decimal) -> String {
    let is_negative = value < Decimal::ZERO;
    let formatted = format!("{:.2}", value.abs());
    let (integer_part, decimal_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let with_separators: String = integer_part
        .chars()
        .rev()
        .enumerate()
        .flat_map(|(i, c)| {
            if i > 0 && i % 3 == 0 {
                vec![' ', c]
            } else {
                vec![c]
            }
        })
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    let sign = if is_negative { "-" } else { "" };
    format!("{}{},{}", sign, with_separators, decimal_part)
}

/// Format as euros: "1 234,56 €"
pub fn format_euros(value: Decimal) -> String {
    format!("{} €", format_decimal_fr(value))
}

/// Format an optional amount, rendering a gap as "N/A"
pub fn format_optional_euros(value: Option<Decimal>) -> String {
    value.map(format_euros).unwrap_or_else(|| "N/A".to_string())
}
