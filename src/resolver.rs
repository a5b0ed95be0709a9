use std::sync::Arc;

use crate::{
    dataset::{Dataset, Table},
    error::{DealError, DealResult},
    store::{DatasetId, DatasetStore},
};

/// Returns the table a query should run against.
///
/// A flat dataset ignores `sheet`. A sheet collection needs a sheet name
/// unless it holds exactly one sheet.
pub fn resolve(
    store: &dyn DatasetStore,
    id: &DatasetId,
    sheet: Option<&str>,
) -> DealResult<Arc<Table>> {
    let dataset = store.fetch(id).ok_or(DealError::DatasetNotFound(*id))?;
    select_table(&dataset, sheet)
}

pub fn select_table(dataset: &Dataset, sheet: Option<&str>) -> DealResult<Arc<Table>> {
    match dataset {
        Dataset::Single(table) => Ok(Arc::clone(table)),
        Dataset::Sheets(sheets) => {
            let available = || sheets.keys().map(String::as_str).collect::<Vec<_>>().join(", ");
            match sheet.map(str::trim).filter(|s| !s.is_empty()) {
                Some(name) => sheets.get(name).cloned().ok_or_else(|| DealError::SheetNotFound {
                    sheet: name.to_string(),
                    available: available(),
                }),
                None if sheets.len() == 1 => sheets
                    .values()
                    .next()
                    .cloned()
                    .ok_or(DealError::NoDealTable),
                None => Err(DealError::SheetRequired {
                    available: available(),
                }),
            }
        }
    }
}
