//! In-process dataset cache keyed by opaque identifiers.

use std::{
    collections::HashMap,
    fmt,
    str::FromStr,
    sync::{Arc, RwLock},
};

use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dataset::Dataset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(Uuid);

impl DatasetId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DatasetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DatasetId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Storage for ingested datasets. Entries are never updated or removed.
pub trait DatasetStore: Send + Sync {
    fn store(&self, dataset: Dataset) -> DatasetId;
    fn fetch(&self, id: &DatasetId) -> Option<Arc<Dataset>>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    datasets: RwLock<HashMap<DatasetId, Arc<Dataset>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores under a known id, e.g. one restored from a snapshot.
    pub fn insert_with_id(&self, id: DatasetId, dataset: Dataset) {
        let mut guard = self
            .datasets
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(id, Arc::new(dataset));
    }

    pub fn len(&self) -> usize {
        self.datasets
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DatasetStore for MemoryStore {
    fn store(&self, dataset: Dataset) -> DatasetId {
        let id = DatasetId::new();
        debug!("Storing dataset {id} ({} row(s))", dataset.row_count());
        self.insert_with_id(id, dataset);
        id
    }

    fn fetch(&self, id: &DatasetId) -> Option<Arc<Dataset>> {
        self.datasets
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(id)
            .cloned()
    }
}
