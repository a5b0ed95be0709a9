use chrono::Datelike;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    columns::SemanticKey,
    dataset::{SOURCE_SHEET_COLUMN, Table},
};

/// Distinct values available for each filter key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCatalog {
    pub regions: Vec<String>,
    pub statuses: Vec<String>,
    pub stages: Vec<String>,
    pub responsibles: Vec<String>,
    pub funnels: Vec<String>,
    pub deal_types: Vec<String>,
    pub sheets: Vec<String>,
    pub years: Vec<String>,
    /// Raw labels of every region-like column, usable as `region_col`.
    pub region_columns: Vec<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

fn distinct(table: &Table, column: Option<usize>) -> Vec<String> {
    let Some(column) = column else {
        return Vec::new();
    };
    table
        .values(column)
        .flatten()
        .map(|v| v.as_display().trim().to_string())
        .filter(|s| !s.is_empty())
        .sorted()
        .dedup()
        .collect()
}

fn year_span(table: &Table, key: SemanticKey) -> impl Iterator<Item = i32> + '_ {
    table
        .semantic_index(key)
        .into_iter()
        .flat_map(move |idx| table.values(idx))
        .flatten()
        .filter_map(|v| v.as_datetime())
        .map(|dt| dt.year())
}

pub fn catalog(table: &Table, region_col: Option<&str>) -> FilterCatalog {
    let region = region_col
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .and_then(|name| table.find_column(name))
        .or_else(|| table.region_columns().first().copied());
    let key = |k: SemanticKey| distinct(table, table.semantic_index(k));
    FilterCatalog {
        regions: distinct(table, region),
        statuses: key(SemanticKey::Status),
        stages: key(SemanticKey::Stage),
        responsibles: key(SemanticKey::Responsible),
        funnels: key(SemanticKey::Funnel),
        deal_types: key(SemanticKey::DealType),
        sheets: distinct(table, table.column_index(SOURCE_SHEET_COLUMN)),
        years: key(SemanticKey::Year),
        region_columns: table
            .region_columns()
            .into_iter()
            .map(|idx| table.columns()[idx].label.clone())
            .collect(),
        start_year: year_span(table, SemanticKey::ConstructionStartDate).min(),
        end_year: year_span(table, SemanticKey::CompletionDate).max(),
    }
}

/// Sorted union of the values of every region-like column.
pub fn distinct_regions(table: &Table) -> Vec<String> {
    table
        .region_columns()
        .into_iter()
        .flat_map(|idx| distinct(table, Some(idx)))
        .sorted()
        .dedup()
        .collect()
}
