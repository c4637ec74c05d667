use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A single non-missing cell. Missing cells are represented as `None` in
/// `Option<Value>` throughout the crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    String(String),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Numeric view of the cell. Booleans count as 1/0 so binary indicator
    /// columns (resolution flags, compliance flags) average into rates.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) if f.is_finite() => Some(*f),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            Value::Date(d) => d.and_hms_opt(0, 0, 0),
            Value::String(s) => parse_naive_datetime(s)
                .or_else(|| parse_naive_date(s).and_then(|d| d.and_hms_opt(0, 0, 0))),
            _ => None,
        }
    }

    /// Exact identity used for duplicate detection; distinguishes variants so
    /// `"1"` never collides with `1`. `-0.0` keys the same as `0.0`.
    pub(crate) fn identity_key(&self) -> String {
        match self {
            Value::String(s) => format!("s:{s}"),
            Value::Integer(i) => format!("i:{i}"),
            Value::Float(f) => {
                let f = if *f == 0.0 { 0.0_f64 } else { *f };
                format!("f:{}", f.to_bits())
            }
            Value::Boolean(b) => format!("b:{b}"),
            Value::Date(d) => format!("d:{d}"),
            Value::DateTime(dt) => format!("t:{dt}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

const MISSING_TOKENS: &[&str] = &[
    "", "na", "n/a", "nan", "-nan", "null", "none", "#n/a", "#na", "<na>",
];

/// Returns `true` when a raw field denotes a missing value.
pub fn is_missing_token(raw: &str) -> bool {
    let trimmed = raw.trim();
    MISSING_TOKENS
        .iter()
        .any(|token| trimmed.eq_ignore_ascii_case(token))
}

pub fn parse_boolean(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" => Some(true),
        "false" | "f" | "no" | "n" => Some(false),
        _ => None,
    }
}

pub fn parse_naive_date(value: &str) -> Option<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    let trimmed = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

pub fn parse_naive_datetime(value: &str) -> Option<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    let trimmed = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
}

/// Parses `value` with one explicit chrono format. Formats carrying a time
/// component yield `DateTime`; date-only formats yield `Date`.
pub fn parse_with_format(value: &str, format: &str) -> Option<Value> {
    let trimmed = value.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
        return Some(Value::DateTime(dt));
    }
    NaiveDate::parse_from_str(trimmed, format)
        .ok()
        .map(Value::Date)
}

/// Lower-cases a header and replaces spaces and hyphens with underscores.
pub fn standardize_column_name(name: &str) -> String {
    name.to_lowercase().replace([' ', '-'], "_")
}
