//! Frequency tables and ranked group totals.
//!
//! Groups are kept in first-seen order so that a stable sort by metric leaves
//! ties in the order they were encountered.

use std::collections::HashMap;

use rust_decimal::prelude::ToPrimitive;
use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::data::Value;

/// Number of entries kept in ranked summaries.
pub const TOP_N: usize = 5;

/// Ordered `(label, metric)` pairs, serialized as a JSON object in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally<T>(pub Vec<(String, T)>);

impl<T> Tally<T> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<&T> {
        self.0.iter().find(|(l, _)| l == label).map(|(_, v)| v)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(l, _)| l.as_str())
    }
}

impl<T: Serialize> Serialize for Tally<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, metric) in &self.0 {
            map.serialize_entry(label, metric)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default)]
struct Group {
    label: String,
    count: usize,
    sum: f64,
}

/// Counts and sums per group key. Rows without a key are not grouped.
#[derive(Debug, Default)]
pub struct GroupAccumulator {
    groups: Vec<Group>,
    positions: HashMap<String, usize>,
}

impl GroupAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one row; a missing metric still counts the row and adds 0.
    pub fn ingest(&mut self, key: Option<&Value>, metric: Option<&Value>) {
        let Some(label) = key.map(|k| k.as_display().trim().to_string()) else {
            return;
        };
        if label.is_empty() {
            return;
        }
        let position = match self.positions.get(&label) {
            Some(position) => *position,
            None => {
                self.groups.push(Group {
                    label: label.clone(),
                    ..Group::default()
                });
                self.positions.insert(label, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        let group = &mut self.groups[position];
        group.count += 1;
        group.sum += metric_value(metric);
    }

    pub fn distinct(&self) -> usize {
        self.groups.len()
    }

    /// Every group by count, descending.
    pub fn counts(&self) -> Tally<usize> {
        let mut items = self
            .groups
            .iter()
            .map(|g| (g.label.clone(), g.count))
            .collect::<Vec<_>>();
        items.sort_by(|a, b| b.1.cmp(&a.1));
        Tally(items)
    }

    pub fn top_by_count(&self, top: usize) -> Tally<usize> {
        let mut tally = self.counts();
        tally.0.truncate(top);
        tally
    }

    pub fn top_by_sum(&self, top: usize) -> Tally<f64> {
        let mut items = self
            .groups
            .iter()
            .map(|g| (g.label.clone(), g.sum))
            .collect::<Vec<_>>();
        items.sort_by(|a, b| b.1.total_cmp(&a.1));
        items.truncate(top);
        Tally(items)
    }
}

/// Numeric value of a cell as `f64`; missing or non-numeric cells are 0.
pub fn metric_value(cell: Option<&Value>) -> f64 {
    cell.and_then(|v| v.as_number())
        .and_then(|d| d.to_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn text(s: &str) -> Value {
        Value::String(s.to_string())
    }

    fn number(n: i64) -> Value {
        Value::Number(Decimal::from(n))
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let mut acc = GroupAccumulator::new();
        for (key, amount) in [("B", 10), ("A", 10), ("C", 30), ("A", 0)] {
            acc.ingest(Some(&text(key)), Some(&number(amount)));
        }
        let by_sum = acc.top_by_sum(TOP_N);
        assert_eq!(by_sum.labels().collect::<Vec<_>>(), vec!["C", "B", "A"]);
        let by_count = acc.counts();
        assert_eq!(by_count.labels().collect::<Vec<_>>(), vec!["A", "B", "C"]);
        assert_eq!(by_count.get("A"), Some(&2));
    }

    #[test]
    fn missing_keys_are_skipped_and_missing_metrics_add_zero() {
        let mut acc = GroupAccumulator::new();
        acc.ingest(None, Some(&number(100)));
        acc.ingest(Some(&text("  ")), Some(&number(100)));
        acc.ingest(Some(&text("A")), None);
        assert_eq!(acc.distinct(), 1);
        assert_eq!(acc.top_by_sum(TOP_N).get("A"), Some(&0.0));
    }

    #[test]
    fn top_truncates_to_requested_size() {
        let mut acc = GroupAccumulator::new();
        for idx in 0..8 {
            acc.ingest(Some(&text(&format!("g{idx}"))), Some(&number(idx)));
        }
        let top = acc.top_by_sum(TOP_N);
        assert_eq!(top.len(), TOP_N);
        assert_eq!(top.0[0], ("g7".to_string(), 7.0));
    }

    #[test]
    fn tally_serializes_as_ordered_object() {
        let tally = Tally(vec![("Beta".to_string(), 200.0), ("Acme".to_string(), 150.0)]);
        let rendered = serde_json::to_string(&tally).unwrap();
        assert_eq!(rendered, r#"{"Beta":200.0,"Acme":150.0}"#);
    }
}
