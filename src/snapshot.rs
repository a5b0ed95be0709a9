//! JSON snapshots of ingested datasets.
//!
//! A snapshot lets a later invocation query a dataset without decoding the
//! source again. It is a convenience cache, written whole and read whole.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{
    dataset::Dataset,
    ingest::IngestReport,
    store::{DatasetId, MemoryStore},
};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub id: DatasetId,
    /// Path of the file the dataset was ingested from.
    pub source: String,
    pub report: IngestReport,
    pub dataset: Dataset,
}

impl Snapshot {
    pub fn new(id: DatasetId, source: impl Into<String>, dataset: Dataset, report: IngestReport) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            id,
            source: source.into(),
            report,
            dataset,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating snapshot {path:?}"))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)
            .with_context(|| format!("Writing snapshot {path:?}"))?;
        writer
            .flush()
            .with_context(|| format!("Flushing snapshot {path:?}"))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening snapshot {path:?}"))?;
        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing snapshot {path:?}"))?;
        ensure!(
            snapshot.version == SNAPSHOT_VERSION,
            "Snapshot {path:?} has version {}, expected {SNAPSHOT_VERSION}",
            snapshot.version
        );
        Ok(snapshot)
    }

    /// Puts the dataset into `store` under its original id.
    pub fn restore(self, store: &MemoryStore) -> DatasetId {
        store.insert_with_id(self.id, self.dataset);
        self.id
    }
}
