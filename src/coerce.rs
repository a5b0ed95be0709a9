//! Type coercion for normalized tables.
//!
//! Cells of known columns are converted to their semantic type. A cell that
//! cannot be converted becomes missing and is counted in the
//! [`CoercionReport`]; it never fails the row. After coercion, rows with
//! every identity column missing are dropped.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    columns::SemanticKey,
    data::{Value, extract_embedded_date, parse_datetime, parse_decimal},
    dataset::{Row, Table},
};

/// Unmapped date columns commonly present in delimited deal exports.
const EXTRA_DATE_COLUMNS: &[&str] = &[
    "дата изменения",
    "дата начала",
    "предполагаемая дата закрытия",
    "дата регистрации заявления (субсидирование)",
];

const EXTRA_NUMERIC_COLUMNS: &[&str] =
    &["цена реализации 1 кв.м жилья в тыс.тенге/1 м2 (гарантирование)"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Number,
    Date,
    /// A date buried in free text, e.g. "2 кв. / АПОЭ 15.03.2025".
    EmbeddedDate,
    Text,
}

impl CellKind {
    pub fn for_column(name: &str, key: Option<SemanticKey>) -> Self {
        match key {
            Some(SemanticKey::Amount | SemanticKey::Cost | SemanticKey::Area) => CellKind::Number,
            Some(
                SemanticKey::CreatedDate
                | SemanticKey::ClosedDate
                | SemanticKey::ConstructionStartDate,
            ) => CellKind::Date,
            Some(SemanticKey::CompletionDate) => CellKind::EmbeddedDate,
            Some(_) => CellKind::Text,
            None if EXTRA_DATE_COLUMNS.contains(&name) => CellKind::Date,
            None if EXTRA_NUMERIC_COLUMNS.contains(&name) => CellKind::Number,
            None => CellKind::Text,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoercionReport {
    /// Cells that held a value but could not be converted, per column.
    pub missing_cells: BTreeMap<String, usize>,
    pub dropped_rows: usize,
}

/// Converts one cell. The flag reports a value that was lost in conversion.
pub fn coerce_cell(kind: CellKind, cell: Option<Value>) -> (Option<Value>, bool) {
    let Some(value) = cell else {
        return (None, false);
    };
    if let Value::String(s) = &value
        && s.trim().is_empty()
    {
        return (None, false);
    }
    let converted = match (kind, value) {
        (CellKind::Text, Value::String(s)) => Some(Value::String(s.trim().to_string())),
        (CellKind::Text, other) => Some(other),
        (CellKind::Number, Value::Number(n)) => Some(Value::Number(n)),
        (CellKind::Number, Value::String(s)) => parse_decimal(&s).ok().map(Value::Number),
        (CellKind::Number, Value::Date(_)) => None,
        (CellKind::Date | CellKind::EmbeddedDate, Value::Date(dt)) => Some(Value::Date(dt)),
        (CellKind::Date, Value::String(s)) => parse_datetime(&s).ok().map(Value::Date),
        (CellKind::EmbeddedDate, Value::String(s)) => extract_embedded_date(&s).map(Value::Date),
        (CellKind::Date | CellKind::EmbeddedDate, Value::Number(_)) => None,
    };
    let lost = converted.is_none();
    (converted, lost)
}

/// Identity columns present in the table, or none when the table has no developer column.
fn identity_columns(table: &Table) -> Vec<usize> {
    let Some(developer) = table.semantic_index(SemanticKey::Developer) else {
        return Vec::new();
    };
    let mut identity = vec![developer];
    identity.extend(table.semantic_index(SemanticKey::Cost));
    identity
}

pub fn coerce_table(table: Table) -> (Table, CoercionReport) {
    let kinds = table
        .columns()
        .iter()
        .map(|c| CellKind::for_column(&c.name, c.key))
        .collect::<Vec<_>>();
    let identity = identity_columns(&table);
    let (columns, rows) = table.into_parts();

    let mut report = CoercionReport::default();
    let mut lost_per_column = vec![0usize; columns.len()];
    let mut kept: Vec<Row> = Vec::with_capacity(rows.len());
    for row in rows {
        let coerced = row
            .into_iter()
            .enumerate()
            .map(|(idx, cell)| {
                let kind = kinds.get(idx).copied().unwrap_or(CellKind::Text);
                let (value, lost) = coerce_cell(kind, cell);
                if lost && let Some(count) = lost_per_column.get_mut(idx) {
                    *count += 1;
                }
                value
            })
            .collect::<Row>();
        if !identity.is_empty() && identity.iter().all(|idx| coerced[*idx].is_none()) {
            report.dropped_rows += 1;
            continue;
        }
        kept.push(coerced);
    }

    for (column, lost) in columns.iter().zip(lost_per_column) {
        if lost > 0 {
            debug!("Column '{}': {lost} cell(s) could not be converted", column.name);
            report.missing_cells.insert(column.name.clone(), lost);
        }
    }
    if report.dropped_rows > 0 {
        debug!("Dropped {} row(s) without identity values", report.dropped_rows);
    }
    (Table::from_parts(columns, kept), report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn text(s: &str) -> Option<Value> {
        Some(Value::String(s.to_string()))
    }

    #[test]
    fn coerce_cell_marks_unparseable_numbers_missing() {
        assert_eq!(
            coerce_cell(CellKind::Number, text("1 500,50")),
            (Some(Value::Number(Decimal::new(150050, 2))), false)
        );
        assert_eq!(coerce_cell(CellKind::Number, text("н/д")), (None, true));
        assert_eq!(coerce_cell(CellKind::Number, text("  ")), (None, false));
        assert_eq!(coerce_cell(CellKind::Number, None), (None, false));
    }

    #[test]
    fn coerce_cell_extracts_completion_dates() {
        let (value, lost) = coerce_cell(CellKind::EmbeddedDate, text("IV кв. 2024 (АПОЭ 20.12.2024)"));
        assert!(!lost);
        let expected = NaiveDate::from_ymd_opt(2024, 12, 20).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(value, Some(Value::Date(expected)));
        assert_eq!(coerce_cell(CellKind::EmbeddedDate, text("IV кв.")), (None, true));
    }

    #[test]
    fn coerce_table_drops_rows_without_identity() {
        let mut table = Table::from_headers(&["Застройщик", "Стоимость", "Регион"]);
        table.push_row(vec![text("ТОО Альфа"), text("100"), text(" Астана ")]);
        table.push_row(vec![None, text("abc"), text("Алматы")]);
        table.push_row(vec![None, text("250"), None]);

        let (coerced, report) = coerce_table(table);
        assert_eq!(coerced.len(), 2);
        assert_eq!(report.dropped_rows, 1);
        assert_eq!(report.missing_cells.get("cost"), Some(&1));
        assert_eq!(coerced.cell(0, 2), Some(&Value::String("Астана".into())));
        assert_eq!(coerced.cell(1, 1), Some(&Value::Number(Decimal::from(250))));
    }

    #[test]
    fn coerce_table_without_developer_keeps_every_row() {
        let mut table = Table::from_headers(&["Компания", "Стоимость незавершенного строительства"]);
        table.push_row(vec![text("Acme"), None]);
        let (coerced, report) = coerce_table(table);
        assert_eq!(coerced.len(), 1);
        assert_eq!(report.dropped_rows, 0);
    }

    #[test]
    fn text_years_are_kept_verbatim() {
        let mut table = Table::from_headers(&["Застройщик", "Год ввода"]);
        table.push_row(vec![text("ТОО Альфа"), text("2025-2026")]);
        table.push_row(vec![text("ТОО Бета"), text(" 2024 г. ")]);
        let (coerced, report) = coerce_table(table);
        assert_eq!(coerced.cell(0, 1), Some(&Value::String("2025-2026".into())));
        assert_eq!(coerced.cell(1, 1), Some(&Value::String("2024 г.".into())));
        assert!(report.missing_cells.is_empty());
    }

    #[test]
    fn extra_export_columns_are_typed() {
        assert_eq!(CellKind::for_column("дата изменения", None), CellKind::Date);
        assert_eq!(CellKind::for_column("комментарий", None), CellKind::Text);
        assert_eq!(
            CellKind::for_column("region_2", Some(SemanticKey::Region)),
            CellKind::Text
        );
    }
}
