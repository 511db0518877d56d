//! Conversion of localized page text into typed values.
//!
//! BCRA pages use Spanish conventions: `.` groups thousands, `,` separates
//! decimals, dates are `DD/MM/YYYY`, and gaps are rendered as a blank cell
//! or a run of dashes.

use std::str::FromStr as _;

use bcra_scraper_models::FieldValue;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Errors produced when text is neither a value nor a recognized placeholder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    /// The text is not a decimal number.
    #[error("Invalid decimal value '{value}'")]
    InvalidDecimal {
        /// The offending text.
        value: String,
    },

    /// The text is neither `DD/MM/YYYY` nor `YYYY-MM-DD`.
    #[error("Invalid date '{value}': expected DD/MM/YYYY or YYYY-MM-DD")]
    InvalidDate {
        /// The offending text.
        value: String,
    },
}

/// Returns `true` for text that stands for "no value": empty, whitespace,
/// or dashes only.
#[must_use]
pub fn is_placeholder(raw: &str) -> bool {
    raw.trim().chars().all(|c| c == '-')
}

/// Parses a decimal cell.
///
/// If the text contains a `,` it is treated as the decimal separator and any
/// `.` as a thousands separator. Otherwise the text is parsed as-is, which
/// keeps already-normalized values (`0.0123560`) stable. The scale of the
/// source text is preserved.
///
/// # Errors
///
/// * [`NormalizeError::InvalidDecimal`] if the text is not a number
pub fn normalize_decimal(raw: &str) -> Result<FieldValue, NormalizeError> {
    let trimmed = raw.trim();
    if is_placeholder(trimmed) {
        return Ok(FieldValue::Missing);
    }

    let canonical = if trimmed.contains(',') {
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.to_owned()
    };

    Decimal::from_str(&canonical)
        .map(FieldValue::Value)
        .map_err(|_| NormalizeError::InvalidDecimal {
            value: raw.to_owned(),
        })
}

/// Parses a date written `DD/MM/YYYY` or `YYYY-MM-DD`.
///
/// # Errors
///
/// * [`NormalizeError::InvalidDate`] for any other format
pub fn normalize_date(raw: &str) -> Result<NaiveDate, NormalizeError> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .map_err(|_| NormalizeError::InvalidDate {
            value: raw.to_owned(),
        })
}

/// Formats a date the way BCRA pages and forms print it (`DD/MM/YYYY`).
#[must_use]
pub fn format_day(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}
