//! Filter predicates over normalized tables.
//!
//! A [`FilterSpec`] is parsed from a JSON object whose keys come from a fixed
//! vocabulary. Scalars mean equality, arrays mean set membership, and the
//! bound and flag keys carry one value each. Values that cannot be used are
//! reported as [`FilterDiagnostic`]s instead of failing the query.

use std::fmt;

use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::{
    columns::SemanticKey,
    data::{Value, parse_datetime, parse_decimal},
    dataset::{SOURCE_SHEET_COLUMN, Table},
};

const TRUTHY: &[&str] = &["true", "1", "yes", "y", "да"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Key(SemanticKey),
    /// The region column, or the override named by `region_col`.
    Region,
    Sheet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Min,
    Max,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals(Target, Value),
    OneOf(Target, Vec<Value>),
    NumberBound(SemanticKey, Bound, Decimal),
    DateBound(SemanticKey, Bound, NaiveDateTime),
    Flag(SemanticKey, bool),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDiagnostic {
    pub key: String,
    pub message: String,
}

impl FilterDiagnostic {
    fn new(key: &str, message: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FilterDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

/// Cell values standing for a set or unset flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagMarkers {
    pub affirmative: String,
    pub negative: String,
}

impl Default for FlagMarkers {
    fn default() -> Self {
        Self {
            affirmative: "Y".to_string(),
            negative: "N".to_string(),
        }
    }
}

impl FlagMarkers {
    fn marker(&self, expected: bool) -> &str {
        if expected {
            &self.affirmative
        } else {
            &self.negative
        }
    }

    pub fn is_affirmative(&self, cell: &Value) -> bool {
        cell.as_display().trim().eq_ignore_ascii_case(self.affirmative.trim())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    pub predicates: Vec<Predicate>,
    /// Column (name or raw label) replacing the default region column.
    pub region_column: Option<String>,
    /// Problems found while parsing.
    pub diagnostics: Vec<FilterDiagnostic>,
    pub markers: FlagMarkers,
}

#[derive(Debug, Clone, Copy)]
enum KeyKind {
    Choice(Target),
    Number(SemanticKey, Bound),
    Date(SemanticKey, Bound),
    Flag(SemanticKey),
    RegionColumn,
}

fn key_kind(key: &str) -> Option<KeyKind> {
    use KeyKind::*;
    let kind = match key {
        "region" | "regions" => Choice(Target::Region),
        "status" => Choice(Target::Key(SemanticKey::Status)),
        "stage" => Choice(Target::Key(SemanticKey::Stage)),
        "responsible" => Choice(Target::Key(SemanticKey::Responsible)),
        "company" => Choice(Target::Key(SemanticKey::Company)),
        "funnel" => Choice(Target::Key(SemanticKey::Funnel)),
        "deal_type" => Choice(Target::Key(SemanticKey::DealType)),
        "year" | "years" => Choice(Target::Key(SemanticKey::Year)),
        "sheet" | "sheets" => Choice(Target::Sheet),
        "amount_min" => Number(SemanticKey::Amount, Bound::Min),
        "amount_max" => Number(SemanticKey::Amount, Bound::Max),
        "cost_min" | "min_cost" => Number(SemanticKey::Cost, Bound::Min),
        "cost_max" | "max_cost" => Number(SemanticKey::Cost, Bound::Max),
        "from" => Date(SemanticKey::CreatedDate, Bound::Min),
        "to" => Date(SemanticKey::ClosedDate, Bound::Max),
        "repeats" => Flag(SemanticKey::RepeatDeal),
        "recontacts" => Flag(SemanticKey::Recontact),
        "region_col" => RegionColumn,
        _ => return None,
    };
    Some(kind)
}

fn is_unspecified(value: &Json) -> bool {
    match value {
        Json::Null => true,
        Json::String(s) => s.trim().is_empty(),
        Json::Array(items) => items.is_empty(),
        Json::Object(map) => map.is_empty(),
        Json::Bool(_) | Json::Number(_) => false,
    }
}

fn scalar_value(value: &Json) -> Option<Value> {
    match value {
        Json::String(s) if !s.trim().is_empty() => Some(Value::String(s.clone())),
        Json::Number(n) => parse_decimal(&n.to_string()).ok().map(Value::Number),
        _ => None,
    }
}

fn number_value(value: &Json) -> Option<Decimal> {
    match value {
        Json::Number(n) => parse_decimal(&n.to_string()).ok(),
        Json::String(s) => parse_decimal(s).ok(),
        _ => None,
    }
}

fn flag_value(value: &Json) -> Option<bool> {
    match value {
        Json::Bool(b) => Some(*b),
        Json::Number(n) => Some(n.as_f64() == Some(1.0)),
        Json::String(s) => {
            let lowered = s.trim().to_lowercase();
            Some(TRUTHY.contains(&lowered.as_str()))
        }
        _ => None,
    }
}

impl FilterSpec {
    pub fn parse_str(text: &str) -> Result<Self> {
        let json: Json = serde_json::from_str(text).context("Parsing filter JSON")?;
        Self::from_json(&json)
    }

    /// Builds a spec from a JSON object; `null` is an empty spec.
    pub fn from_json(json: &Json) -> Result<Self> {
        let map = match json {
            Json::Null => return Ok(Self::default()),
            Json::Object(map) => map,
            other => bail!("Filters must be a JSON object, got {other}"),
        };
        let mut spec = Self::default();
        for (key, value) in map {
            if is_unspecified(value) {
                continue;
            }
            let Some(kind) = key_kind(key) else {
                spec.diagnostics
                    .push(FilterDiagnostic::new(key, "unknown filter key ignored"));
                continue;
            };
            spec.parse_entry(key, kind, value);
        }
        Ok(spec)
    }

    pub fn with_markers(mut self, markers: FlagMarkers) -> Self {
        self.markers = markers;
        self
    }

    fn parse_entry(&mut self, key: &str, kind: KeyKind, value: &Json) {
        match kind {
            KeyKind::Choice(target) => match value {
                Json::Array(items) => {
                    let mut values = Vec::with_capacity(items.len());
                    for item in items {
                        match scalar_value(item) {
                            Some(v) => values.push(v),
                            None if is_unspecified(item) => {}
                            None => self.diagnostics.push(FilterDiagnostic::new(
                                key,
                                format!("unsupported list element {item} ignored"),
                            )),
                        }
                    }
                    if !values.is_empty() {
                        self.predicates.push(Predicate::OneOf(target, values));
                    }
                }
                other => match scalar_value(other) {
                    Some(v) => self.predicates.push(Predicate::Equals(target, v)),
                    None => self.diagnostics.push(FilterDiagnostic::new(
                        key,
                        format!("expected a string, number or list, got {other}"),
                    )),
                },
            },
            KeyKind::Number(column, bound) => match number_value(value) {
                Some(limit) => self
                    .predicates
                    .push(Predicate::NumberBound(column, bound, limit)),
                None => self.diagnostics.push(FilterDiagnostic::new(
                    key,
                    format!("expected a number, got {value}"),
                )),
            },
            KeyKind::Date(column, bound) => {
                let parsed = value.as_str().and_then(|s| parse_datetime(s).ok());
                match parsed {
                    Some(limit) => self
                        .predicates
                        .push(Predicate::DateBound(column, bound, limit)),
                    None => self.diagnostics.push(FilterDiagnostic::new(
                        key,
                        format!("expected a date, got {value}"),
                    )),
                }
            }
            KeyKind::Flag(column) => match flag_value(value) {
                Some(expected) => self.predicates.push(Predicate::Flag(column, expected)),
                None => self.diagnostics.push(FilterDiagnostic::new(
                    key,
                    format!("expected a boolean, got {value}"),
                )),
            },
            KeyKind::RegionColumn => match value.as_str() {
                Some(name) => self.region_column = Some(name.trim().to_string()),
                None => self.diagnostics.push(FilterDiagnostic::new(
                    key,
                    format!("expected a column name, got {value}"),
                )),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filtered {
    pub table: Table,
    pub diagnostics: Vec<FilterDiagnostic>,
}

/// A predicate bound to a column of one table.
struct Check<'a> {
    column: usize,
    predicate: &'a Predicate,
}

impl Check<'_> {
    fn accepts(&self, row: &[Option<Value>], markers: &FlagMarkers) -> bool {
        let Some(cell) = row.get(self.column).and_then(|c| c.as_ref()) else {
            return false;
        };
        match self.predicate {
            Predicate::Equals(_, wanted) => cell.matches(wanted),
            Predicate::OneOf(_, wanted) => wanted.iter().any(|w| cell.matches(w)),
            Predicate::NumberBound(_, bound, limit) => {
                cell.as_number().is_some_and(|n| within(&n, bound, limit))
            }
            Predicate::DateBound(_, bound, limit) => {
                cell.as_datetime().is_some_and(|d| within(&d, bound, limit))
            }
            Predicate::Flag(_, expected) => cell
                .as_display()
                .trim()
                .eq_ignore_ascii_case(markers.marker(*expected).trim()),
        }
    }
}

fn within<T: PartialOrd>(value: &T, bound: &Bound, limit: &T) -> bool {
    match bound {
        Bound::Min => value >= limit,
        Bound::Max => value <= limit,
    }
}

fn region_column(table: &Table, spec: &FilterSpec) -> Result<Option<usize>, FilterDiagnostic> {
    match &spec.region_column {
        Some(name) => table.find_column(name).map(Some).ok_or_else(|| {
            FilterDiagnostic::new(
                "region_col",
                format!("column '{name}' not found; region filter skipped"),
            )
        }),
        None => Ok(table.region_columns().first().copied()),
    }
}

/// Applies every predicate conjunctively and returns a new table.
///
/// Predicates whose column is absent from `table` do not restrict anything.
pub fn apply(table: &Table, spec: &FilterSpec) -> Filtered {
    let mut diagnostics = spec.diagnostics.clone();
    let region = match region_column(table, spec) {
        Ok(index) => index,
        Err(diagnostic) => {
            diagnostics.push(diagnostic);
            None
        }
    };

    let mut checks = Vec::with_capacity(spec.predicates.len());
    for predicate in &spec.predicates {
        let column = match predicate {
            Predicate::Equals(target, _) | Predicate::OneOf(target, _) => match target {
                Target::Key(key) => table.semantic_index(*key),
                Target::Region => region,
                Target::Sheet => table.column_index(SOURCE_SHEET_COLUMN),
            },
            Predicate::NumberBound(key, _, _)
            | Predicate::DateBound(key, _, _)
            | Predicate::Flag(key, _) => table.semantic_index(*key),
        };
        match column {
            Some(column) => checks.push(Check { column, predicate }),
            None => debug!("Filter {predicate:?} ignored: column not present"),
        }
    }

    let filtered = table.select_rows(|row| checks.iter().all(|check| check.accepts(row, &spec.markers)));
    for diagnostic in &diagnostics {
        debug!("Filter diagnostic: {diagnostic}");
    }
    debug!("Filtered {} of {} row(s)", filtered.len(), table.len());
    Filtered {
        table: filtered,
        diagnostics,
    }
}
