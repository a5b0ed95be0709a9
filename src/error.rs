use thiserror::Error;

use crate::store::DatasetId;

pub type DealResult<T> = Result<T, DealError>;

#[derive(Error, Debug)]
pub enum DealError {
    #[error("No deal table found: no sheet contains a recognizable header row")]
    NoDealTable,

    #[error("Dataset '{0}' not found")]
    DatasetNotFound(DatasetId),

    #[error("Sheet '{sheet}' not found (available: {available})")]
    SheetNotFound { sheet: String, available: String },

    #[error("Dataset holds several sheets; choose one of: {available}")]
    SheetRequired { available: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
