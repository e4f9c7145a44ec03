//! Field parsing shared by the report loaders. Spreadsheet exports are
//! inconsistent, so dates and amounts accept a few formats.

use std::path::Path;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;

use crate::core::end_of_month;
use crate::error::{ModelError, Result};

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

pub fn parse_date(value: &str, context: &str) -> Result<NaiveDate> {
    let value = value.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Ok(date);
        }
    }
    // Monthly report headers look like "Mar 2024".
    if let Ok(date) = NaiveDate::parse_from_str(&format!("1 {value}"), "%d %b %Y") {
        return Ok(end_of_month(date));
    }
    Err(ModelError::InvalidDate {
        value: value.to_string(),
        context: context.to_string(),
    })
}

pub fn parse_optional_date(value: &str, context: &str) -> Result<Option<NaiveDate>> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    parse_date(value, context).map(Some)
}

/// Parses "$1,234.50", "-300" or accounting-style "(300.00)". Blank cells are
/// zero.
pub fn parse_amount(value: &str, context: &str) -> Result<f64> {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    if cleaned.is_empty() {
        return Ok(0.0);
    }

    let (negative, digits) = match cleaned.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, cleaned.as_str()),
    };
    let amount = digits
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ModelError::InvalidAmount {
            value: value.to_string(),
            context: context.to_string(),
        })?;
    Ok(if negative { -amount } else { amount })
}

/// Parses "25%" or "0.25" into a fraction.
pub fn parse_fraction(value: &str, context: &str) -> Result<f64> {
    let trimmed = value.trim();
    match trimmed.strip_suffix('%') {
        Some(percent) => parse_amount(percent, context).map(|v| v / 100.0),
        None => parse_amount(trimmed, context),
    }
}

pub(crate) fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let csv_error = |source| ModelError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(false)
        .from_path(path)
        .map_err(csv_error)?;

    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record.map_err(csv_error)?);
    }
    Ok(records)
}

pub(crate) fn row_context(path: &Path, row: usize) -> String {
    format!("{} row {}", path.display(), row + 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_quickbooks_and_month_header_dates() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(parse_date("2024-03-07", "t").unwrap(), expected);
        assert_eq!(parse_date(" 03/07/2024 ", "t").unwrap(), expected);
        assert_eq!(
            parse_date("Mar 2024", "t").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
        );
        assert!(matches!(
            parse_date("someday", "t"),
            Err(ModelError::InvalidDate { .. })
        ));
        assert_eq!(parse_optional_date("  ", "t").unwrap(), None);
    }

    #[test]
    fn parses_currency_and_accounting_amounts() {
        assert_eq!(parse_amount("$1,234.50", "t").unwrap(), 1234.5);
        assert_eq!(parse_amount("(300.00)", "t").unwrap(), -300.0);
        assert_eq!(parse_amount("-12", "t").unwrap(), -12.0);
        assert_eq!(parse_amount("", "t").unwrap(), 0.0);
        assert!(parse_amount("twelve", "t").is_err());
    }

    #[test]
    fn parses_percent_fractions() {
        assert_eq!(parse_fraction("25%", "t").unwrap(), 0.25);
        assert_eq!(parse_fraction("0.4", "t").unwrap(), 0.4);
        assert_eq!(parse_fraction("", "t").unwrap(), 0.0);
    }
}
