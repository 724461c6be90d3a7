//! Single-column normalizers
//!
//! Stateless per-value functions plus their Arrow column forms. None of them
//! fail on bad input: anything unparseable becomes the null sentinel.

use crate::error::{Error, Result};
use arrow::array::{Array, ArrayRef, Date32Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::Arc;
use std::sync::LazyLock;

/// `M/d/yyyy`: one or two digit month and day, four digit year
static MONTH_DAY_YEAR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap());

/// Days from 0001-01-01 (CE day 1) to the Unix epoch
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

// ============================================================================
// Value Normalizers
// ============================================================================

/// Strip every character that is not a decimal digit
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Replace the null sentinel with an empty string
pub fn coalesce_null(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

/// Date layouts understood by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// `M/d/yyyy`, as found in the source CSV files
    MonthDayYear,
    /// `yyyy-MM-dd`, as stored in the warehouse
    Iso,
}

impl DateFormat {
    /// Parse a string in this format, `None` when it does not match or is not
    /// a real calendar date
    pub fn parse(self, raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();
        match self {
            DateFormat::MonthDayYear => {
                let caps = MONTH_DAY_YEAR_REGEX.captures(raw)?;
                let month = caps[1].parse().ok()?;
                let day = caps[2].parse().ok()?;
                let year = caps[3].parse().ok()?;
                NaiveDate::from_ymd_opt(year, month, day)
            }
            DateFormat::Iso => NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok(),
        }
    }

    /// Render a date in this format
    pub fn render(self, date: NaiveDate) -> String {
        match self {
            DateFormat::MonthDayYear => {
                format!("{}/{}/{:04}", date.month(), date.day(), date.year())
            }
            DateFormat::Iso => date.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Parse `raw` against `source`, returning `None` instead of an error
pub fn normalize_date(raw: &str, source: DateFormat) -> Option<NaiveDate> {
    source.parse(raw)
}

/// Convert a date to Arrow's Date32 representation (days since the epoch)
pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Convert Arrow's Date32 representation back to a date
pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
}

// ============================================================================
// Column Normalizers
// ============================================================================

/// View any column as Utf8, casting when needed
pub(crate) fn as_utf8(column: &ArrayRef) -> Result<ArrayRef> {
    if column.data_type() == &DataType::Utf8 {
        return Ok(Arc::clone(column));
    }
    Ok(cast(column.as_ref(), &DataType::Utf8)?)
}

pub(crate) fn downcast_utf8(column: &ArrayRef) -> Result<&StringArray> {
    column
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::output("Failed to downcast to StringArray"))
}

/// Apply [`normalize_phone`] to every non-null cell
pub fn phone_column(column: &ArrayRef) -> Result<ArrayRef> {
    let utf8 = as_utf8(column)?;
    let values = downcast_utf8(&utf8)?;
    let cleaned: StringArray = values.iter().map(|v| v.map(normalize_phone)).collect();
    Ok(Arc::new(cleaned))
}

/// Apply [`coalesce_null`] to every cell, producing a null-free Utf8 column
pub fn coalesce_column(column: &ArrayRef) -> Result<ArrayRef> {
    let utf8 = as_utf8(column)?;
    let values = downcast_utf8(&utf8)?;
    let cleaned: StringArray = values.iter().map(|v| Some(coalesce_null(v))).collect();
    Ok(Arc::new(cleaned))
}

/// Reparse a text column into Date32, unparseable cells become null
pub fn date_column(column: &ArrayRef, source: DateFormat) -> Result<ArrayRef> {
    if column.data_type() == &DataType::Date32 {
        return Ok(Arc::clone(column));
    }
    let utf8 = as_utf8(column)?;
    let values = downcast_utf8(&utf8)?;
    let dates: Date32Array = values
        .iter()
        .map(|v| v.and_then(|raw| normalize_date(raw, source)).map(date_to_days))
        .collect();
    Ok(Arc::new(dates))
}

