//! Optional YAML settings shared by every command.
//!
//! ```yaml
//! anchors: [застройщик, компания]
//! allowed_sheets: [Действующие, Завершенные]
//! region_fallback: Регион (гарантирование)
//! markers: { affirmative: Y, negative: N }
//! delimiter: ";"
//! encoding: windows-1251
//! unify_sheets: false
//! ```
//!
//! Every key is optional. Command-line flags take precedence over the file.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    cli::parse_delimiter,
    decode::DecodeOptions,
    error::DealError,
    filter::FlagMarkers,
    header::DEFAULT_ANCHORS,
    ingest::IngestOptions,
    io_utils,
    summary::{DEFAULT_REGION_FALLBACK, SummaryOptions},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub anchors: Vec<String>,
    pub allowed_sheets: Vec<String>,
    pub region_fallback: String,
    pub markers: FlagMarkers,
    pub delimiter: Option<String>,
    pub encoding: Option<String>,
    pub unify_sheets: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            anchors: DEFAULT_ANCHORS.iter().map(|a| a.to_string()).collect(),
            allowed_sheets: Vec::new(),
            region_fallback: DEFAULT_REGION_FALLBACK.to_string(),
            markers: FlagMarkers::default(),
            delimiter: None,
            encoding: None,
            unify_sheets: false,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("Reading settings {path:?}"))?;
        let settings: Settings = serde_yaml::from_str(&text)
            .with_context(|| format!("Parsing settings {path:?}"))?;
        settings
            .validate()
            .with_context(|| format!("Validating settings {path:?}"))?;
        Ok(settings)
    }

    /// Loads `path` when given, defaults otherwise.
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), DealError> {
        let affirmative = self.markers.affirmative.trim();
        let negative = self.markers.negative.trim();
        if affirmative.is_empty() || negative.is_empty() {
            return Err(DealError::Config("flag markers must not be empty".into()));
        }
        if affirmative.eq_ignore_ascii_case(negative) {
            return Err(DealError::Config(format!(
                "affirmative and negative markers are both '{affirmative}'"
            )));
        }
        if let Some(delimiter) = &self.delimiter {
            parse_delimiter(delimiter).map_err(DealError::Config)?;
        }
        if let Some(encoding) = &self.encoding {
            io_utils::resolve_encoding(Some(encoding))
                .map_err(|err| DealError::Config(err.to_string()))?;
        }
        Ok(())
    }

    /// Decode options; the explicit arguments override the file.
    pub fn decode_options(
        &self,
        delimiter: Option<u8>,
        encoding: Option<&str>,
    ) -> Result<DecodeOptions> {
        let delimiter = match (delimiter, &self.delimiter) {
            (Some(explicit), _) => Some(explicit),
            (None, Some(configured)) => Some(parse_delimiter(configured).map_err(DealError::Config)?),
            (None, None) => None,
        };
        let encoding = io_utils::resolve_encoding(encoding.or(self.encoding.as_deref()))?;
        Ok(DecodeOptions {
            delimiter,
            encoding,
        })
    }

    pub fn ingest_options(&self, allowed_sheets: &[String], unify: bool) -> IngestOptions {
        IngestOptions {
            anchors: self.anchors.clone(),
            allowed_sheets: if allowed_sheets.is_empty() {
                self.allowed_sheets.clone()
            } else {
                allowed_sheets.to_vec()
            },
            unify: unify || self.unify_sheets,
        }
    }

    pub fn summary_options(&self, region_fallback: Option<&str>) -> SummaryOptions {
        SummaryOptions {
            markers: self.markers.clone(),
            region_fallback: region_fallback
                .unwrap_or(&self.region_fallback)
                .to_string(),
        }
    }
}
