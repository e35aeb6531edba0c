use chrono::NaiveDate;
use thiserror::Error;

use super::types::{ColumnRole, Dimension};

/// Why a single cell could not be turned into a timestamp.
///
/// This never leaves the sanitizer: the row is dropped and counted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizationFailure {
    #[error("cell is empty")]
    Empty,
    #[error("serial {0} is outside the representable date range")]
    OutOfRange(f64),
    #[error("unrecognised date/time text: {0:?}")]
    Unparseable(String),
}

/// Dataset- and configuration-level conditions surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("no usable rows: {0}")]
    EmptyDataset(String),

    #[error("no data between {start} and {end}")]
    NoDataInPeriod { start: NaiveDate, end: NaiveDate },

    #[error("at least one {0} must be selected")]
    SelectionRequired(Dimension),

    #[error("column mapping for {role}: {reason}")]
    ColumnMapping { role: ColumnRole, reason: String },

    #[error("invalid selection: {0}")]
    InvalidSelection(String),
}

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::EmptyDataset(_) | EngineError::NoDataInPeriod { .. } => "EMPTY_DATASET",
            EngineError::SelectionRequired(_) => "SELECTION_REQUIRED",
            EngineError::ColumnMapping { .. } => "COLUMN_MAPPING",
            EngineError::InvalidSelection(_) => "INVALID_SELECTION",
        }
    }
}
