//! Value and column-name normalization
//!
//! Every cell is canonicalized here before it takes part in any comparison,
//! row key, or uniqueness computation. Two cells are "the same" exactly when
//! their normalized strings are equal.

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::OnceLock;

/// Largest magnitude at which every integer is exactly representable as `f64`.
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// Text values treated as missing, compared case-insensitively after trimming.
const MISSING_MARKERS: &[&str] = &[
    "nan", "-nan", "null", "none", "n/a", "na", "<na>", "#n/a", "#na", "nat",
];

/// A raw scalar as delivered by a record source, before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Text(String),
    Integer(i128),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value as i128)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Null)
    }
}

/// Canonicalize a column name: trimmed, lowercased, whitespace runs become `_`.
pub fn normalize_column_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Canonicalize a typed cell value.
pub fn normalize_value(value: &CellValue) -> String {
    match value {
        CellValue::Null => String::new(),
        CellValue::Text(text) => normalize_text(text),
        CellValue::Integer(i) => i.to_string(),
        CellValue::Float(f) => normalize_float(*f),
        CellValue::Boolean(b) => b.to_string(),
        CellValue::Date(d) => format_date(*d),
        CellValue::Timestamp(ts) => format_date(ts.date()),
    }
}

/// Canonicalize a textual cell value.
pub fn normalize_text(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() || is_missing_marker(trimmed) {
        return String::new();
    }

    if let Some(date) = parse_date_like(trimmed) {
        return format_date(date);
    }

    if let Some(number) = normalize_numeric_text(trimmed) {
        return number;
    }

    trimmed.to_lowercase()
}

fn is_missing_marker(text: &str) -> bool {
    MISSING_MARKERS
        .iter()
        .any(|marker| text.eq_ignore_ascii_case(marker))
}

fn date_like_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{4}-\d{2}-\d{2})(?:[ T]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?)?$")
            .expect("date pattern is valid")
    })
}

fn parse_date_like(text: &str) -> Option<NaiveDate> {
    let captures = date_like_pattern().captures(text)?;
    NaiveDate::parse_from_str(captures.get(1)?.as_str(), "%Y-%m-%d").ok()
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Numeric round-trip: `"007"` and `"7.0"` both become `"7"`.
fn normalize_numeric_text(text: &str) -> Option<String> {
    if let Ok(int) = text.parse::<i128>() {
        return Some(int.to_string());
    }

    // Rust accepts "inf"/"infinity" as floats; those stay plain text.
    let float = text.parse::<f64>().ok().filter(|f| f.is_finite())?;
    Some(format_finite_float(float))
}

fn normalize_float(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else if value.is_infinite() {
        let text = if value > 0.0 { "inf" } else { "-inf" };
        text.to_string()
    } else {
        format_finite_float(value)
    }
}

fn format_finite_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() <= MAX_EXACT_FLOAT_INT {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}
