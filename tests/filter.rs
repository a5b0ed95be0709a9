mod common;

use std::sync::Arc;

use common::fixture_path;
use deal_lens::{
    columns::SemanticKey,
    data::Value,
    dataset::{Dataset, Table},
    decode::DecodeOptions,
    filter::{FilterSpec, apply},
    ingest::{IngestOptions, ingest_path},
};
use rust_decimal::Decimal;
use serde_json::json;

fn deals() -> Arc<Table> {
    let ingested = ingest_path(
        &fixture_path("deals.csv"),
        &DecodeOptions::default(),
        &IngestOptions::default(),
    )
    .expect("ingest fixture");
    match ingested.dataset {
        Dataset::Single(table) => table,
        Dataset::Sheets(_) => panic!("csv should yield a single table"),
    }
}

fn regional_deals() -> Table {
    let mut table = Table::from_headers(&["company", "amount", "region"]);
    for (company, amount, region) in [("Acme", 100, "North"), ("Acme", 50, "South"), ("Beta", 200, "North")] {
        table.push_row(vec![
            Some(Value::String(company.into())),
            Some(Value::Number(Decimal::from(amount))),
            Some(Value::String(region.into())),
        ]);
    }
    table
}

fn spec(value: serde_json::Value) -> FilterSpec {
    FilterSpec::from_json(&value).expect("filter spec")
}

fn companies(table: &Table) -> Vec<String> {
    let idx = table.semantic_index(SemanticKey::Company).unwrap();
    table
        .values(idx)
        .map(|v| v.map(|v| v.as_display()).unwrap_or_default())
        .collect()
}

#[test]
fn region_set_keeps_matching_rows_only() {
    let table = regional_deals();
    let filtered = apply(&table, &spec(json!({"region": ["North"]})));
    assert_eq!(filtered.table.len(), 2);
    assert_eq!(companies(&filtered.table), vec!["Acme", "Beta"]);
    assert!(filtered.diagnostics.is_empty());
}

#[test]
fn unparseable_bound_is_ignored_with_a_diagnostic() {
    let table = regional_deals();
    let filtered = apply(&table, &spec(json!({"amount_min": "not-a-number"})));
    assert_eq!(filtered.table, table);
    assert_eq!(filtered.diagnostics.len(), 1);
    assert_eq!(filtered.diagnostics[0].key, "amount_min");
}

#[test]
fn filtering_never_mutates_the_source() {
    let table = deals();
    let before = table.as_ref().clone();
    let first = apply(&table, &spec(json!({"stage": "Won"})));
    let second = apply(&table, &spec(json!({"stage": "Won"})));
    assert_eq!(*table, before);
    assert_eq!(first, second);
}

#[test]
fn predicates_are_conjunctive() {
    let table = deals();
    let a = spec(json!({"stage": ["Won", "Lost"]}));
    let b = spec(json!({"amount_min": 100}));
    let both = spec(json!({"stage": ["Won", "Lost"], "amount_min": 100}));

    let combined = apply(&table, &both).table;
    let chained = apply(&apply(&table, &a).table, &b).table;
    let reversed = apply(&apply(&table, &b).table, &a).table;
    assert_eq!(combined, chained);
    assert_eq!(combined, reversed);
    assert_eq!(companies(&combined), vec!["Acme", "Beta", "Gamma"]);
}

#[test]
fn date_range_uses_created_and_closed_dates() {
    let table = deals();
    let filtered = apply(&table, &spec(json!({"from": "2024-02-01", "to": "31.03.2024"}))).table;
    assert_eq!(companies(&filtered), vec!["Acme", "Beta"]);
}

#[test]
fn region_override_targets_another_column() {
    let table = deals();
    let filtered = apply(
        &table,
        &spec(json!({"region": "Алматы", "region_col": "Регион (гарантирование)"})),
    );
    assert_eq!(companies(&filtered.table), vec!["Beta", "Beta"]);
    assert!(filtered.diagnostics.is_empty());

    let by_name = apply(&table, &spec(json!({"region": "Алматы", "region_col": "region_2"})));
    assert_eq!(by_name.table, filtered.table);
}

#[test]
fn flags_and_text_sets_combine() {
    let table = deals();
    let repeats = apply(&table, &spec(json!({"repeats": true}))).table;
    assert_eq!(companies(&repeats), vec!["Acme", "Gamma"]);

    let recontacts = apply(&table, &spec(json!({"recontacts": "yes", "funnel": "Продажи"}))).table;
    assert_eq!(companies(&recontacts), vec!["Beta"]);
}

#[test]
fn numeric_strings_match_numeric_cells() {
    let table = deals();
    let by_number = apply(&table, &spec(json!({"amount_min": 200, "amount_max": 200}))).table;
    let by_string = apply(&table, &spec(json!({"amount_min": "200", "amount_max": "200,0"}))).table;
    assert_eq!(by_number, by_string);
    assert_eq!(companies(&by_number), vec!["Beta"]);
}

#[test]
fn empty_spec_returns_every_row() {
    let table = deals();
    let filtered = apply(&table, &FilterSpec::default());
    assert_eq!(filtered.table, *table);
}
