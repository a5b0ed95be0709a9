//! Fixed-shape summaries over a (filtered) table.
//!
//! Every field has a well-defined value when its source column is absent:
//! counts are 0, totals and means 0.0 and frequency tables empty.

use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::{
    columns::SemanticKey,
    data::Value,
    dataset::{SOURCE_SHEET_COLUMN, Table},
    filter::FlagMarkers,
    frequency::{GroupAccumulator, TOP_N, Tally},
};

pub const DEFAULT_REGION_FALLBACK: &str = "Регион (гарантирование)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionNote {
    /// Raw label of the column used for the region ranking.
    pub region_col: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_deals: usize,
    pub total_amount: f64,
    pub avg_amount: f64,
    pub unique_companies: usize,
    pub deals_by_stage: Tally<usize>,
    pub deals_by_status: Tally<usize>,
    pub deals_by_funnel: Tally<usize>,
    pub top_companies_by_sum: Tally<f64>,
    pub top_companies_by_count: Tally<usize>,
    pub top_regions_by_sum: Tally<f64>,
    pub top_regions_by_sum_note: Option<RegionNote>,
    pub repeats: usize,
    pub recontacts: usize,
    pub total_cost: f64,
    pub avg_cost: f64,
    pub total_area: f64,
    pub by_region: Tally<usize>,
    pub by_sheet: Tally<usize>,
    pub by_year: Tally<usize>,
    pub top_builders_by_cost: Tally<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryOptions {
    pub markers: FlagMarkers,
    /// Raw label of the region column preferred when no override applies.
    pub region_fallback: String,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            markers: FlagMarkers::default(),
            region_fallback: DEFAULT_REGION_FALLBACK.to_string(),
        }
    }
}

/// Picks the column used for the region ranking.
///
/// Order: an override that resolves to a column holding at least one value,
/// the column labelled like `fallback_label`, the canonical region column.
pub fn choose_region_column(
    table: &Table,
    region_col: Option<&str>,
    fallback_label: &str,
) -> Option<usize> {
    if let Some(name) = region_col.map(str::trim).filter(|n| !n.is_empty())
        && let Some(index) = table.find_column(name)
        && table.has_values(index)
    {
        return Some(index);
    }
    let fallback = fallback_label.trim().to_lowercase();
    table
        .columns()
        .iter()
        .position(|c| !fallback.is_empty() && c.label.to_lowercase() == fallback)
        .or_else(|| table.semantic_index(SemanticKey::Region))
}

struct ColumnView<'a> {
    table: &'a Table,
    index: Option<usize>,
}

impl<'a> ColumnView<'a> {
    fn new(table: &'a Table, index: Option<usize>) -> Self {
        Self { table, index }
    }

    fn key(table: &'a Table, key: SemanticKey) -> Self {
        Self::new(table, table.semantic_index(key))
    }

    fn present(&self) -> bool {
        self.index.is_some()
    }

    fn cell(&self, row: usize) -> Option<&'a Value> {
        self.index.and_then(|idx| self.table.cell(row, idx))
    }

    /// Sum and count of the numeric cells.
    fn total(&self) -> (f64, usize) {
        (0..self.table.len())
            .filter_map(|row| self.cell(row).and_then(|v| v.as_number()))
            .fold((0.0, 0), |(sum, count), n| {
                (sum + n.to_f64().unwrap_or(0.0), count + 1)
            })
    }

    fn groups(&self, metric: &ColumnView<'a>) -> GroupAccumulator {
        let mut acc = GroupAccumulator::new();
        if self.present() {
            for row in 0..self.table.len() {
                acc.ingest(self.cell(row), metric.cell(row));
            }
        }
        acc
    }

    fn counts(&self) -> Tally<usize> {
        self.groups(&ColumnView::new(self.table, None)).counts()
    }

    fn count_affirmative(&self, markers: &FlagMarkers) -> usize {
        (0..self.table.len())
            .filter(|row| self.cell(*row).is_some_and(|v| markers.is_affirmative(v)))
            .count()
    }
}

fn mean((sum, count): (f64, usize)) -> f64 {
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Ranks `by` groups on the summed `metric`, empty when `metric` is absent.
fn top_by_sum(by: &ColumnView<'_>, metric: &ColumnView<'_>) -> Tally<f64> {
    if !metric.present() {
        return Tally::default();
    }
    by.groups(metric).top_by_sum(TOP_N)
}

pub fn summarize(table: &Table, region_col: Option<&str>, options: &SummaryOptions) -> Summary {
    let amount = ColumnView::key(table, SemanticKey::Amount);
    let cost = ColumnView::key(table, SemanticKey::Cost);
    let company = ColumnView::key(table, SemanticKey::Company);
    let developer = ColumnView::key(table, SemanticKey::Developer);
    let ranking_index = choose_region_column(table, region_col, &options.region_fallback);
    let ranking_region = ColumnView::new(table, ranking_index);
    let companies = company.groups(&amount);

    let amount_total = amount.total();
    let cost_total = cost.total();
    Summary {
        total_deals: table.len(),
        total_amount: amount_total.0,
        avg_amount: mean(amount_total),
        unique_companies: companies.distinct(),
        deals_by_stage: ColumnView::key(table, SemanticKey::Stage).counts(),
        deals_by_status: ColumnView::key(table, SemanticKey::Status).counts(),
        deals_by_funnel: ColumnView::key(table, SemanticKey::Funnel).counts(),
        top_companies_by_sum: if amount.present() {
            companies.top_by_sum(TOP_N)
        } else {
            Tally::default()
        },
        top_companies_by_count: companies.top_by_count(TOP_N),
        top_regions_by_sum: top_by_sum(&ranking_region, &amount),
        top_regions_by_sum_note: ranking_index.map(|idx| RegionNote {
            region_col: table.columns()[idx].label.clone(),
        }),
        repeats: ColumnView::key(table, SemanticKey::RepeatDeal).count_affirmative(&options.markers),
        recontacts: ColumnView::key(table, SemanticKey::Recontact).count_affirmative(&options.markers),
        total_cost: cost_total.0,
        avg_cost: mean(cost_total),
        total_area: ColumnView::key(table, SemanticKey::Area).total().0,
        by_region: ColumnView::key(table, SemanticKey::Region).counts(),
        by_sheet: ColumnView::new(table, table.column_index(SOURCE_SHEET_COLUMN)).counts(),
        by_year: ColumnView::key(table, SemanticKey::Year).counts(),
        top_builders_by_cost: top_by_sum(&developer, &cost),
    }
}
