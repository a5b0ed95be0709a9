//! Typed cell values and the lenient number and date parsers.

use std::{fmt, str::FromStr, sync::OnceLock};

use anyhow::{Result, anyhow, bail};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A typed cell. Missing cells are represented as `Option::None` by callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Value {
    String(String),
    Number(Decimal),
    /// Date-only values are stored at midnight.
    Date(NaiveDateTime),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Number(d) => d.normalize().to_string(),
            Value::Date(dt) => {
                if dt.time() == NaiveTime::MIN {
                    dt.format("%Y-%m-%d").to_string()
                } else {
                    dt.format("%Y-%m-%d %H:%M:%S").to_string()
                }
            }
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Value::Number(d) => Some(*d),
            Value::String(s) => parse_decimal(s).ok(),
            Value::Date(_) => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(dt) => Some(*dt),
            Value::String(s) => parse_datetime(s).ok(),
            Value::Number(_) => None,
        }
    }

    /// Equality after coercing `wanted` towards the cell's own type.
    pub fn matches(&self, wanted: &Value) -> bool {
        match (self, wanted) {
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Number(a), Value::String(b)) => parse_decimal(b).is_ok_and(|b| *a == b),
            (Value::String(a), Value::Number(b)) => parse_decimal(a).is_ok_and(|a| a == *b),
            (Value::Date(a), Value::String(b)) => parse_datetime(b).is_ok_and(|b| *a == b),
            (Value::String(a), Value::Date(b)) => parse_datetime(a).is_ok_and(|a| a == *b),
            (Value::Number(_), Value::Date(_)) | (Value::Date(_), Value::Number(_)) => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Parses numbers written with either a comma or a point as decimal mark.
///
/// Spaces (including non-breaking ones), apostrophes, underscores and common
/// currency symbols are ignored. With a single kind of separator, one
/// occurrence is the decimal mark and several are grouping marks. With both
/// kinds present the right-most one is the decimal mark.
pub fn parse_decimal(value: &str) -> Result<Decimal> {
    let trimmed = value.trim();
    let mut body = String::with_capacity(trimmed.len());
    let mut exponent = false;
    for ch in trimmed.chars() {
        match ch {
            '0'..='9' | '.' | ',' | '-' | '+' => body.push(ch),
            'e' | 'E' => {
                exponent = true;
                body.push('e');
            }
            ' ' | '\u{a0}' | '\u{202f}' | '\'' | '_' => continue,
            '$' | '€' | '£' | '₸' | '₽' => continue,
            _ => bail!("Failed to parse '{value}' as number"),
        }
    }
    if !body.chars().any(|c| c.is_ascii_digit()) {
        bail!("Failed to parse '{value}' as number");
    }
    let normalized = normalize_separators(&body)
        .ok_or_else(|| anyhow!("Ambiguous separators in '{value}'"))?;
    let parsed = if exponent {
        Decimal::from_scientific(&normalized)
    } else {
        Decimal::from_str(&normalized)
    };
    parsed.map_err(|_| anyhow!("Failed to parse '{value}' as number"))
}

fn normalize_separators(body: &str) -> Option<String> {
    let commas = body.matches(',').count();
    let points = body.matches('.').count();
    match (commas, points) {
        (0, 0) => Some(body.to_string()),
        (1, 0) => Some(body.replace(',', ".")),
        (0, 1) => Some(body.to_string()),
        (_, 0) => Some(body.replace(',', "")),
        (0, _) => Some(body.replace('.', "")),
        _ => {
            let last_comma = body.rfind(',')?;
            let last_point = body.rfind('.')?;
            if last_comma > last_point {
                if commas > 1 {
                    return None;
                }
                Some(body.replace('.', "").replace(',', "."))
            } else {
                if points > 1 {
                    return None;
                }
                Some(body.replace(',', ""))
            }
        }
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: &[&str] = &["%d.%m.%Y", "%Y-%m-%d"];

pub fn parse_datetime(value: &str) -> Result<NaiveDateTime> {
    let trimmed = value.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(parsed);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(parsed.and_time(NaiveTime::MIN));
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

fn embedded_date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d{2}\.\d{2}\.\d{4}").expect("valid date pattern"))
}

/// Finds the first `dd.mm.yyyy` fragment inside free text and parses it.
pub fn extract_embedded_date(text: &str) -> Option<NaiveDateTime> {
    embedded_date_pattern()
        .find_iter(text)
        .find_map(|m| NaiveDate::parse_from_str(m.as_str(), "%d.%m.%Y").ok())
        .map(|d| d.and_time(NaiveTime::MIN))
}
