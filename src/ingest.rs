//! Ingestion pipeline: decoded sheets become a normalized [`Dataset`].
//!
//! Each sheet goes through header location, column normalization and type
//! coercion independently. Sheets without a recognizable header are dropped
//! and reported; the upload fails only when no sheet survives.

use std::{collections::BTreeMap, path::Path, sync::Arc};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    coerce::{CoercionReport, coerce_table},
    data::Value,
    dataset::{Dataset, SOURCE_SHEET_COLUMN, Table},
    decode::{self, DecodeOptions, Sheet, SourceFormat},
    error::{DealError, DealResult},
    header::{self, DEFAULT_ANCHORS},
};

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub anchors: Vec<String>,
    /// Only these workbook sheets are considered when non-empty.
    pub allowed_sheets: Vec<String>,
    /// Merge workbook sheets into one table instead of keeping one per sheet.
    pub unify: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            anchors: DEFAULT_ANCHORS.iter().map(|a| a.to_string()).collect(),
            allowed_sheets: Vec::new(),
            unify: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetReport {
    pub name: String,
    pub header_row: usize,
    pub rows: usize,
    pub columns: usize,
    pub coercion: CoercionReport,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub sheets: Vec<SheetReport>,
    /// Sheets dropped because no header row could be located.
    pub skipped_sheets: Vec<String>,
    /// Sheets outside the configured allow-list.
    pub ignored_sheets: Vec<String>,
}

impl IngestReport {
    pub fn total_rows(&self) -> usize {
        self.sheets.iter().map(|s| s.rows).sum()
    }
}

#[derive(Debug, Clone)]
pub struct Ingested {
    pub dataset: Dataset,
    pub report: IngestReport,
}

fn sheet_allowed(name: &str, allowed: &[String]) -> bool {
    let name = name.trim().to_lowercase();
    allowed.is_empty()
        || allowed
            .iter()
            .any(|candidate| candidate.trim().to_lowercase() == name)
}

fn normalize_sheet(sheet: &Sheet, anchors: &[String], provenance: bool) -> Option<(Table, SheetReport)> {
    let split = header::split_at_header(&sheet.rows, anchors)?;
    let reserved: &[&str] = if provenance { &[SOURCE_SHEET_COLUMN] } else { &[] };
    let mut labels = split.labels;
    if provenance {
        labels.push(SOURCE_SHEET_COLUMN.to_string());
    }
    let mut table = Table::from_labels(&labels, reserved);
    if provenance {
        // The provenance label would otherwise be suffixed like any other collision.
        table = rename_last_column(table, SOURCE_SHEET_COLUMN);
    }
    let sheet_value = Value::String(sheet.name.clone());
    for mut row in split.rows {
        if provenance {
            row.resize(labels.len() - 1, None);
            row.push(Some(sheet_value.clone()));
        }
        table.push_row(row);
    }
    let (table, coercion) = coerce_table(table);
    let report = SheetReport {
        name: sheet.name.clone(),
        header_row: split.header_row,
        rows: table.len(),
        columns: table.columns().len(),
        coercion,
    };
    Some((table, report))
}

fn rename_last_column(table: Table, name: &str) -> Table {
    let (mut columns, rows) = table.into_parts();
    if let Some(last) = columns.last_mut() {
        last.name = name.to_string();
        last.key = None;
    }
    Table::from_parts(columns, rows)
}

/// Builds a dataset from decoded sheets.
///
/// Delimited sources become a single table without provenance, headed by
/// their first non-empty row. Workbook sheets are searched for an anchor row
/// and carry the `__source_sheet` column.
pub fn ingest_sheets(
    sheets: Vec<Sheet>,
    format: SourceFormat,
    options: &IngestOptions,
) -> DealResult<Ingested> {
    let mut report = IngestReport::default();
    let provenance = format == SourceFormat::Workbook;
    let mut tables = BTreeMap::new();

    for sheet in &sheets {
        if provenance && !sheet_allowed(&sheet.name, &options.allowed_sheets) {
            info!("Ignoring sheet '{}' (not in the allowed list)", sheet.name);
            report.ignored_sheets.push(sheet.name.clone());
            continue;
        }
        // Delimited exports start with their header row.
        let anchors: &[String] = if provenance { &options.anchors } else { &[] };
        match normalize_sheet(sheet, anchors, provenance) {
            Some((table, sheet_report)) => {
                info!(
                    "Sheet '{}': header at row {}, {} row(s), {} column(s)",
                    sheet.name,
                    sheet_report.header_row + 1,
                    sheet_report.rows,
                    sheet_report.columns
                );
                report.sheets.push(sheet_report);
                tables.insert(sheet.name.clone(), Arc::new(table));
            }
            None => {
                warn!("Skipping sheet '{}': no header row found", sheet.name);
                report.skipped_sheets.push(sheet.name.clone());
            }
        }
    }

    if tables.is_empty() {
        return Err(DealError::NoDealTable);
    }

    let dataset = if !provenance {
        let table = tables
            .into_values()
            .next()
            .ok_or(DealError::NoDealTable)?;
        Dataset::Single(table)
    } else if options.unify {
        let merged = Dataset::Sheets(tables).unified();
        Dataset::Single(Arc::new(merged))
    } else {
        Dataset::Sheets(tables)
    };
    info!(
        "Ingested {} row(s) from {} sheet(s)",
        dataset.row_count(),
        report.sheets.len()
    );
    Ok(Ingested { dataset, report })
}

pub fn ingest_bytes(
    bytes: &[u8],
    format: SourceFormat,
    decode_options: &DecodeOptions,
    options: &IngestOptions,
) -> DealResult<Ingested> {
    let sheets = decode::decode_bytes(bytes, format, decode_options)?;
    ingest_sheets(sheets, format, options)
}

pub fn ingest_path(
    path: &Path,
    decode_options: &DecodeOptions,
    options: &IngestOptions,
) -> DealResult<Ingested> {
    let sheets = decode::decode_path(path, decode_options)?;
    ingest_sheets(sheets, SourceFormat::from_path(path), options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Row;

    fn row(cells: &[&str]) -> Row {
        cells
            .iter()
            .map(|c| (!c.is_empty()).then(|| Value::String(c.to_string())))
            .collect()
    }

    fn sheet(name: &str, rows: Vec<Row>) -> Sheet {
        Sheet {
            name: name.to_string(),
            rows,
        }
    }

    #[test]
    fn workbook_sheets_carry_provenance() {
        let sheets = vec![
            sheet(
                "Действующие",
                vec![
                    row(&["Реестр", ""]),
                    row(&["Застройщик", "Стоимость"]),
                    row(&["ТОО Альфа", "100"]),
                ],
            ),
            sheet("Итоги", vec![row(&["Всего", "1"])]),
        ];
        let ingested =
            ingest_sheets(sheets, SourceFormat::Workbook, &IngestOptions::default()).unwrap();
        assert_eq!(ingested.report.skipped_sheets, vec!["Итоги"]);
        let table = match &ingested.dataset {
            Dataset::Sheets(sheets) => sheets["Действующие"].clone(),
            other => panic!("unexpected dataset {other:?}"),
        };
        assert_eq!(table.column_names(), vec!["developer", "cost", SOURCE_SHEET_COLUMN]);
        assert_eq!(table.cell(0, 2), Some(&Value::String("Действующие".into())));
    }

    #[test]
    fn no_header_anywhere_is_fatal() {
        let sheets = vec![sheet("Лист1", vec![row(&["Итого", "5"])])];
        let err = ingest_sheets(sheets, SourceFormat::Workbook, &IngestOptions::default()).unwrap_err();
        assert!(matches!(err, DealError::NoDealTable));
    }

    #[test]
    fn allow_list_ignores_other_sheets() {
        let body = vec![row(&["Застройщик"]), row(&["ТОО Альфа"])];
        let sheets = vec![sheet("Действующие", body.clone()), sheet("Черновик", body)];
        let options = IngestOptions {
            allowed_sheets: vec!["Действующие".to_string()],
            ..IngestOptions::default()
        };
        let ingested = ingest_sheets(sheets, SourceFormat::Workbook, &options).unwrap();
        assert_eq!(ingested.report.ignored_sheets, vec!["Черновик"]);
        assert_eq!(ingested.dataset.sheet_names(), vec!["Действующие"]);
    }

    #[test]
    fn unify_merges_sheets_into_one_table() {
        let sheets = vec![
            sheet("A", vec![row(&["Застройщик", "Площадь"]), row(&["X", "10"])]),
            sheet("B", vec![row(&["Застройщик", "Стоимость"]), row(&["Y", "20"])]),
        ];
        let options = IngestOptions {
            unify: true,
            ..IngestOptions::default()
        };
        let ingested = ingest_sheets(sheets, SourceFormat::Workbook, &options).unwrap();
        let Dataset::Single(table) = &ingested.dataset else {
            panic!("expected a single table");
        };
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.column_names(),
            vec!["developer", "area", SOURCE_SHEET_COLUMN, "cost"]
        );
    }

    #[test]
    fn delimited_source_is_a_single_table_without_provenance() {
        let data = "Компания;Сумма\nAcme;100\n";
        let ingested = ingest_bytes(
            data.as_bytes(),
            SourceFormat::Delimited,
            &DecodeOptions::default(),
            &IngestOptions::default(),
        )
        .unwrap();
        let Dataset::Single(table) = &ingested.dataset else {
            panic!("expected a single table");
        };
        assert_eq!(table.column_names(), vec!["company", "amount"]);
        assert_eq!(ingested.report.total_rows(), 1);
    }
}
