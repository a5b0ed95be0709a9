use std::collections::HashSet;

use deal_lens::{
    columns::{SemanticKey, dedupe_names, normalize, semantic_key},
    dataset::Table,
};
use proptest::prelude::*;

const EXPORT_HEADERS: &[&str] = &[
    " Регион ",
    "регион:",
    "Регион (гарантирование)",
    "Стоимость незавершенного строительства",
    "Дата завершения 2/Дата по АПОЭ",
    "Дата создания",
    "Повторная сделка",
    "Company Name",
    "Deal-Type",
    "Комментарий",
];

fn header_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[ a-zA-Zа-яА-ЯёЁ0-9_:()/.,-]{0,32}",
        proptest::sample::select(EXPORT_HEADERS).prop_map(String::from),
    ]
}

proptest! {
    #[test]
    fn normalization_is_idempotent(raw in header_strategy()) {
        let once = normalize(&raw);
        prop_assert_eq!(normalize(&once), once.clone());
        prop_assert_eq!(semantic_key(&once), semantic_key(&raw));
    }

    #[test]
    fn deduplicated_names_are_unique(headers in proptest::collection::vec(header_strategy(), 0..12)) {
        let names = headers.iter().map(|h| normalize(h)).collect::<Vec<_>>();
        let unique = dedupe_names(names, &[]);
        prop_assert_eq!(unique.len(), headers.len());
        let distinct = unique.iter().collect::<HashSet<_>>();
        prop_assert_eq!(distinct.len(), unique.len());
    }
}

#[test]
fn colliding_region_headers_stay_distinct() {
    let table = Table::from_headers(&[" Регион ", "регион:", "Сумма"]);
    assert_eq!(table.column_names(), vec!["region", "region_2", "amount"]);
    assert_eq!(table.find_column(" Регион "), Some(0));
    assert_eq!(table.find_column("регион:"), Some(1));
    assert_eq!(table.columns()[1].key, Some(SemanticKey::Region));
}

#[test]
fn english_headers_share_the_vocabulary() {
    assert_eq!(normalize("Company Name"), "company");
    assert_eq!(normalize("Deal-Type"), "deal_type");
    assert_eq!(normalize("Close Date"), "closed_date");
    assert_eq!(normalize("Pipeline"), "funnel");
}
