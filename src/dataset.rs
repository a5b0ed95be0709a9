use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    columns::{self, SemanticKey},
    data::Value,
};

/// Provenance column added to tables built from workbook sheets.
pub const SOURCE_SHEET_COLUMN: &str = "__source_sheet";

pub type Row = Vec<Option<Value>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Normalized, unique within its table.
    pub name: String,
    /// Source spelling, trimmed.
    pub label: String,
    pub key: Option<SemanticKey>,
}

impl Column {
    pub fn from_label(label: &str) -> Self {
        Self {
            name: columns::normalize(label),
            label: label.trim().to_string(),
            key: columns::semantic_key(label),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl Table {
    /// Builds an empty table whose column names are normalized and de-duplicated.
    pub fn from_headers<S: AsRef<str>>(headers: &[S]) -> Self {
        Self::from_labels(headers, &[])
    }

    pub(crate) fn from_labels<S: AsRef<str>>(headers: &[S], reserved: &[&str]) -> Self {
        let mut columns = headers
            .iter()
            .map(|h| Column::from_label(h.as_ref()))
            .collect::<Vec<_>>();
        let names = columns.iter().map(|c| c.name.clone()).collect();
        for (column, name) in columns.iter_mut().zip(columns::dedupe_names(names, reserved)) {
            column.name = name;
        }
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub(crate) fn from_parts(columns: Vec<Column>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub(crate) fn into_parts(self) -> (Vec<Column>, Vec<Row>) {
        (self.columns, self.rows)
    }

    /// Appends a row, padding with missing cells or truncating to the column count.
    pub fn push_row(&mut self, mut row: Row) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Looks a column up by normalized name first, then by its source label.
    pub fn find_column(&self, name_or_label: &str) -> Option<usize> {
        let wanted = name_or_label.trim();
        self.column_index(wanted)
            .or_else(|| self.columns.iter().position(|c| c.label == wanted))
            .or_else(|| {
                let lowered = wanted.to_lowercase();
                self.columns
                    .iter()
                    .position(|c| c.label.to_lowercase() == lowered)
            })
    }

    pub fn semantic_index(&self, key: SemanticKey) -> Option<usize> {
        self.column_index(key.as_str())
    }

    /// Every column carrying region semantics, in column order.
    pub fn region_columns(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.key == Some(SemanticKey::Region))
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row)?.get(column)?.as_ref()
    }

    pub fn values(&self, column: usize) -> impl Iterator<Item = Option<&Value>> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(column).and_then(|v| v.as_ref()))
    }

    pub fn has_values(&self, column: usize) -> bool {
        self.values(column).any(|v| v.is_some())
    }

    /// Returns a new table holding the rows accepted by `keep`.
    pub fn select_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&[Option<Value>]) -> bool,
    {
        Table {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| keep(row.as_slice()))
                .cloned()
                .collect(),
        }
    }

    /// Stacks tables; the column set is the union of names in first-seen order.
    pub fn concat<'a, I>(tables: I) -> Table
    where
        I: IntoIterator<Item = &'a Table>,
    {
        let tables = tables.into_iter().collect::<Vec<_>>();
        let mut columns: Vec<Column> = Vec::new();
        for table in &tables {
            for column in &table.columns {
                if !columns.iter().any(|c| c.name == column.name) {
                    columns.push(column.clone());
                }
            }
        }
        let mut rows = Vec::with_capacity(tables.iter().map(|t| t.len()).sum());
        for table in &tables {
            let mapping = table
                .columns
                .iter()
                .map(|c| columns.iter().position(|u| u.name == c.name))
                .collect::<Vec<_>>();
            for row in &table.rows {
                let mut merged: Row = vec![None; columns.len()];
                for (src, dest) in mapping.iter().enumerate() {
                    if let Some(dest) = dest {
                        merged[*dest] = row.get(src).cloned().flatten();
                    }
                }
                rows.push(merged);
            }
        }
        Table { columns, rows }
    }
}

/// One uploaded source: a flat table or one table per sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Dataset {
    Single(Arc<Table>),
    Sheets(BTreeMap<String, Arc<Table>>),
}

impl Dataset {
    pub fn sheet_names(&self) -> Vec<&str> {
        match self {
            Dataset::Single(_) => Vec::new(),
            Dataset::Sheets(sheets) => sheets.keys().map(|k| k.as_str()).collect(),
        }
    }

    pub fn sheet(&self, name: &str) -> Option<Arc<Table>> {
        match self {
            Dataset::Single(_) => None,
            Dataset::Sheets(sheets) => sheets.get(name).cloned(),
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            Dataset::Single(table) => table.len(),
            Dataset::Sheets(sheets) => sheets.values().map(|t| t.len()).sum(),
        }
    }

    /// Merges all sheets into one table; the provenance column keeps rows traceable.
    pub fn unified(&self) -> Table {
        match self {
            Dataset::Single(table) => table.as_ref().clone(),
            Dataset::Sheets(sheets) => Table::concat(sheets.values().map(|t| t.as_ref())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Option<Value> {
        Some(Value::String(s.to_string()))
    }

    #[test]
    fn from_headers_keeps_both_colliding_columns() {
        let table = Table::from_headers(&[" Регион ", "регион:", "Сумма"]);
        assert_eq!(table.column_names(), vec!["region", "region_2", "amount"]);
        assert_eq!(table.columns()[1].label, "регион:");
        assert_eq!(table.find_column("регион:"), Some(1));
        assert_eq!(table.region_columns(), vec![0, 1]);
    }

    #[test]
    fn push_row_pads_and_truncates() {
        let mut table = Table::from_headers(&["company", "amount"]);
        table.push_row(vec![text("Acme")]);
        table.push_row(vec![text("Beta"), None, text("extra")]);
        assert_eq!(table.rows()[0].len(), 2);
        assert_eq!(table.rows()[1].len(), 2);
        assert_eq!(table.cell(0, 1), None);
    }

    #[test]
    fn select_rows_leaves_source_untouched() {
        let mut table = Table::from_headers(&["company"]);
        table.push_row(vec![text("Acme")]);
        table.push_row(vec![text("Beta")]);
        let before = table.clone();
        let selected = table.select_rows(|row| row[0] == text("Beta"));
        assert_eq!(selected.len(), 1);
        assert_eq!(table, before);
    }

    #[test]
    fn concat_unions_columns_by_name() {
        let mut first = Table::from_headers(&["developer", "cost"]);
        first.push_row(vec![text("A"), text("1")]);
        let mut second = Table::from_headers(&["developer", "area"]);
        second.push_row(vec![text("B"), text("2")]);

        let merged = Table::concat([&first, &second]);
        assert_eq!(merged.column_names(), vec!["developer", "cost", "area"]);
        assert_eq!(merged.rows()[1], vec![text("B"), None, text("2")]);
    }
}
