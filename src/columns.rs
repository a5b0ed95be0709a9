//! Column normalization onto the semantic vocabulary.
//!
//! Raw headers are cleaned (trimmed, lowercased, whitespace and hyphen runs
//! collapsed) and then tested against [`RULES`], an ordered table of keyword
//! matchers. The first rule that matches decides the canonical column name;
//! headers no rule recognizes keep their cleaned spelling.
//!
//! Every rule also matches its own canonical name, which keeps
//! [`normalize`] idempotent.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticKey {
    Region,
    Status,
    Stage,
    Responsible,
    Company,
    Amount,
    RepeatDeal,
    Recontact,
    CreatedDate,
    ClosedDate,
    Funnel,
    DealType,
    Cost,
    Area,
    Year,
    Developer,
    TaxId,
    ConstructionStartDate,
    CompletionDate,
}

impl SemanticKey {
    pub const ALL: [SemanticKey; 19] = [
        SemanticKey::Region,
        SemanticKey::Status,
        SemanticKey::Stage,
        SemanticKey::Responsible,
        SemanticKey::Company,
        SemanticKey::Amount,
        SemanticKey::RepeatDeal,
        SemanticKey::Recontact,
        SemanticKey::CreatedDate,
        SemanticKey::ClosedDate,
        SemanticKey::Funnel,
        SemanticKey::DealType,
        SemanticKey::Cost,
        SemanticKey::Area,
        SemanticKey::Year,
        SemanticKey::Developer,
        SemanticKey::TaxId,
        SemanticKey::ConstructionStartDate,
        SemanticKey::CompletionDate,
    ];

    /// Canonical column name used in normalized tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticKey::Region => "region",
            SemanticKey::Status => "status",
            SemanticKey::Stage => "stage",
            SemanticKey::Responsible => "responsible",
            SemanticKey::Company => "company",
            SemanticKey::Amount => "amount",
            SemanticKey::RepeatDeal => "repeat_deal",
            SemanticKey::Recontact => "recontact",
            SemanticKey::CreatedDate => "created_date",
            SemanticKey::ClosedDate => "closed_date",
            SemanticKey::Funnel => "funnel",
            SemanticKey::DealType => "deal_type",
            SemanticKey::Cost => "cost",
            SemanticKey::Area => "area",
            SemanticKey::Year => "year",
            SemanticKey::Developer => "developer",
            SemanticKey::TaxId => "tax_id",
            SemanticKey::ConstructionStartDate => "construction_start_date",
            SemanticKey::CompletionDate => "completion_date",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        SemanticKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == name)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    /// Any needle occurs as a substring.
    Contains(&'static [&'static str]),
    /// Every needle occurs as a substring.
    ContainsAll(&'static [&'static str]),
    /// Any needle occurs as a whole word.
    Word(&'static [&'static str]),
}

impl Matcher {
    fn is_match(&self, cleaned: &str, words: &[&str]) -> bool {
        match self {
            Matcher::Contains(needles) => needles.iter().any(|n| cleaned.contains(n)),
            Matcher::ContainsAll(needles) => needles.iter().all(|n| cleaned.contains(n)),
            Matcher::Word(needles) => needles.iter().any(|n| words.contains(n)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub key: SemanticKey,
    pub matchers: &'static [Matcher],
}

impl Rule {
    pub fn is_match(&self, cleaned: &str, words: &[&str]) -> bool {
        cleaned == self.key.as_str() || self.matchers.iter().any(|m| m.is_match(cleaned, words))
    }
}

/// Evaluated top to bottom; the first hit wins.
pub const RULES: &[Rule] = &[
    Rule {
        key: SemanticKey::Cost,
        matchers: &[Matcher::Contains(&["стоимость", "cost"])],
    },
    Rule {
        key: SemanticKey::Area,
        matchers: &[Matcher::Contains(&["площадь", "area"])],
    },
    Rule {
        key: SemanticKey::Region,
        matchers: &[Matcher::Contains(&["регион", "область", "region", "oblast"])],
    },
    Rule {
        key: SemanticKey::CompletionDate,
        matchers: &[
            Matcher::ContainsAll(&["дата завершения", "апоэ"]),
            Matcher::Contains(&["completion date"]),
        ],
    },
    Rule {
        key: SemanticKey::ConstructionStartDate,
        matchers: &[Matcher::Contains(&[
            "дата начала строительства",
            "construction start",
        ])],
    },
    Rule {
        key: SemanticKey::Year,
        matchers: &[Matcher::Word(&["год", "year"])],
    },
    Rule {
        key: SemanticKey::TaxId,
        matchers: &[
            Matcher::Word(&["бин", "bin", "инн"]),
            Matcher::Contains(&["tax id"]),
        ],
    },
    Rule {
        key: SemanticKey::Developer,
        matchers: &[Matcher::Contains(&["застройщик", "developer", "builder"])],
    },
    Rule {
        key: SemanticKey::RepeatDeal,
        matchers: &[Matcher::Contains(&["повторная сделка", "repeat deal"])],
    },
    Rule {
        key: SemanticKey::Recontact,
        matchers: &[Matcher::Contains(&["повторное обращение", "recontact"])],
    },
    Rule {
        key: SemanticKey::DealType,
        matchers: &[Matcher::Contains(&["тип сделки", "deal type"])],
    },
    Rule {
        key: SemanticKey::Stage,
        matchers: &[Matcher::Contains(&["стадия", "stage"])],
    },
    Rule {
        key: SemanticKey::Status,
        matchers: &[Matcher::Contains(&["статус", "status"])],
    },
    Rule {
        key: SemanticKey::Responsible,
        matchers: &[Matcher::Contains(&["ответственн", "responsible", "owner"])],
    },
    Rule {
        key: SemanticKey::Company,
        matchers: &[Matcher::Contains(&["компания", "company"])],
    },
    Rule {
        key: SemanticKey::Amount,
        matchers: &[Matcher::Contains(&["сумма", "amount"])],
    },
    Rule {
        key: SemanticKey::CreatedDate,
        matchers: &[Matcher::Contains(&["дата создания", "created"])],
    },
    Rule {
        key: SemanticKey::ClosedDate,
        matchers: &[Matcher::Contains(&["дата завершения", "closed", "close date"])],
    },
    Rule {
        key: SemanticKey::Funnel,
        matchers: &[Matcher::Contains(&["воронка", "funnel", "pipeline"])],
    },
];

/// Trims, lowercases and collapses runs of whitespace and hyphens to one space.
pub fn clean_header(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    let mut pending_space = false;
    for ch in raw.chars().flat_map(char::to_lowercase) {
        if ch.is_whitespace() || ch == '-' {
            pending_space = true;
            continue;
        }
        if pending_space && !cleaned.is_empty() {
            cleaned.push(' ');
        }
        pending_space = false;
        cleaned.push(ch);
    }
    cleaned
}

fn words(cleaned: &str) -> Vec<&str> {
    cleaned
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

fn classify_cleaned(cleaned: &str) -> Option<SemanticKey> {
    let words = words(cleaned);
    RULES
        .iter()
        .find(|rule| rule.is_match(cleaned, &words))
        .map(|rule| rule.key)
}

pub fn semantic_key(raw: &str) -> Option<SemanticKey> {
    classify_cleaned(&clean_header(raw))
}

pub fn normalize(raw: &str) -> String {
    let cleaned = clean_header(raw);
    match classify_cleaned(&cleaned) {
        Some(key) => key.as_str().to_string(),
        None => cleaned,
    }
}

/// Makes names unique: repeated names get `_2`, `_3`, ... in column order.
///
/// `reserved` names are claimed up front, so a raw column that normalizes to a
/// reserved name is suffixed rather than the reserved column.
pub fn dedupe_names(names: Vec<String>, reserved: &[&str]) -> Vec<String> {
    let mut used: HashSet<String> = reserved.iter().map(|s| s.to_string()).collect();
    let mut unique = Vec::with_capacity(names.len());
    for name in names {
        let base = if name.is_empty() {
            format!("field_{}", unique.len())
        } else {
            name
        };
        if used.insert(base.clone()) {
            unique.push(base);
            continue;
        }
        let mut suffix = 2usize;
        loop {
            let candidate = format!("{base}_{suffix}");
            if used.insert(candidate.clone()) {
                unique.push(candidate);
                break;
            }
            suffix += 1;
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_header_collapses_whitespace_and_hyphens() {
        assert_eq!(clean_header("  Дата\nзавершения -- 2  "), "дата завершения 2");
        assert_eq!(clean_header("Tax-ID"), "tax id");
        assert_eq!(clean_header(""), "");
    }

    #[test]
    fn russian_export_headers_map_to_keys() {
        let cases = [
            ("Стоимость, тенге", "cost"),
            ("Стоимость незавершенного строительства (гарантирование)", "cost"),
            ("Площадь ЗУ, га (гарантирование)", "area"),
            ("Регион (субсидирование)", "region"),
            ("Область", "region"),
            ("Дата завершения 2/Дата по АПОЭ", "completion_date"),
            ("Дата начала строительства", "construction_start_date"),
            ("Год ввода", "year"),
            ("БИН", "tax_id"),
            ("Застройщик", "developer"),
            ("Повторная сделка", "repeat_deal"),
            ("Повторное обращение", "recontact"),
            ("Тип сделки", "deal_type"),
            ("Стадия сделки", "stage"),
            ("Текущий статус", "status"),
            ("Ответственный", "responsible"),
            ("Компания", "company"),
            ("Сумма", "amount"),
            ("Дата создания", "created_date"),
            ("Дата завершения", "closed_date"),
            ("Воронка", "funnel"),
        ];
        for (raw, expected) in cases {
            assert_eq!(normalize(raw), expected, "header {raw:?}");
        }
    }

    #[test]
    fn unmatched_headers_keep_cleaned_spelling() {
        assert_eq!(normalize("Дата изменения"), "дата изменения");
        assert_eq!(normalize("  Предполагаемая   дата закрытия "), "предполагаемая дата закрытия");
        assert_eq!(semantic_key("Комментарий"), None);
    }

    #[test]
    fn short_keywords_require_whole_words() {
        assert_eq!(normalize("Комбинат"), "комбинат");
        assert_eq!(normalize("Годовой отчёт"), "годовой отчёт");
        assert_eq!(normalize("Год"), "year");
    }

    #[test]
    fn canonical_names_are_fixed_points() {
        for key in SemanticKey::ALL {
            assert_eq!(normalize(key.as_str()), key.as_str());
            assert_eq!(semantic_key(key.as_str()), Some(key));
        }
    }

    #[test]
    fn dedupe_names_suffixes_collisions_in_order() {
        let names = vec![
            "region".to_string(),
            "amount".to_string(),
            "region".to_string(),
            "region_2".to_string(),
            "region".to_string(),
        ];
        assert_eq!(
            dedupe_names(names, &[]),
            vec!["region", "amount", "region_2", "region_2_2", "region_3"]
        );
    }

    #[test]
    fn dedupe_names_honours_reserved_names() {
        let names = vec!["__source_sheet".to_string(), String::new()];
        assert_eq!(
            dedupe_names(names, &["__source_sheet"]),
            vec!["__source_sheet_2", "field_1"]
        );
    }
}
