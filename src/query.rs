use log::info;
use serde::Serialize;

use crate::{
    catalog::{self, FilterCatalog},
    error::DealResult,
    filter::{self, FilterDiagnostic, FilterSpec},
    resolver,
    store::{DatasetId, DatasetStore},
    summary::{self, Summary, SummaryOptions},
};

#[derive(Debug, Clone)]
pub struct Query {
    pub dataset_id: DatasetId,
    pub sheet: Option<String>,
    pub filters: FilterSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOutcome {
    pub row_count: usize,
    pub summary: Summary,
    pub diagnostics: Vec<FilterDiagnostic>,
}

/// Resolves the table, filters it and summarizes the remaining rows.
pub fn run_query(
    store: &dyn DatasetStore,
    query: &Query,
    options: &SummaryOptions,
) -> DealResult<QueryOutcome> {
    let table = resolver::resolve(store, &query.dataset_id, query.sheet.as_deref())?;
    let filters = query.filters.clone().with_markers(options.markers.clone());
    let filtered = filter::apply(&table, &filters);
    let summary = summary::summarize(
        &filtered.table,
        filters.region_column.as_deref(),
        options,
    );
    info!(
        "Query on dataset {} kept {} of {} row(s)",
        query.dataset_id,
        filtered.table.len(),
        table.len()
    );
    Ok(QueryOutcome {
        row_count: filtered.table.len(),
        summary,
        diagnostics: filtered.diagnostics,
    })
}

pub fn run_catalog(
    store: &dyn DatasetStore,
    dataset_id: &DatasetId,
    sheet: Option<&str>,
    region_col: Option<&str>,
) -> DealResult<FilterCatalog> {
    let table = resolver::resolve(store, dataset_id, sheet)?;
    Ok(catalog::catalog(&table, region_col))
}

pub fn run_regions(
    store: &dyn DatasetStore,
    dataset_id: &DatasetId,
    sheet: Option<&str>,
) -> DealResult<Vec<String>> {
    let table = resolver::resolve(store, dataset_id, sheet)?;
    Ok(catalog::distinct_regions(&table))
}
