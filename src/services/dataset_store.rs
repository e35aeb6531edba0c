use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::services::engine::{Dataset, RawTable};

/// In-memory home for uploaded tables and their sanitized datasets.
///
/// Entries are immutable once inserted; readers share them through `Arc`.
#[derive(Clone)]
pub struct DatasetStore {
    raw: Cache<String, Arc<RawTable>>,
    clean: Cache<String, Arc<Dataset>>,
    sequence: Arc<AtomicU64>,
}

impl DatasetStore {
    pub fn new(capacity: u64, time_to_idle: Duration) -> Self {
        info!(
            "Creating dataset store (capacity: {}, idle expiry: {:?})",
            capacity, time_to_idle
        );
        Self {
            raw: Cache::builder()
                .max_capacity(capacity)
                .time_to_idle(time_to_idle)
                .build(),
            clean: Cache::builder()
                .max_capacity(capacity)
                .time_to_idle(time_to_idle)
                .build(),
            sequence: Arc::new(AtomicU64::new(1)),
        }
    }

    fn next_id(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("ds_{}_{}", chrono::Utc::now().timestamp_millis(), seq)
    }

    pub fn insert_raw(&self, table: RawTable) -> String {
        let id = self.next_id();
        debug!("Storing raw table {} ({} rows)", id, table.rows.len());
        self.raw.insert(id.clone(), Arc::new(table));
        id
    }

    pub fn raw(&self, id: &str) -> Result<Arc<RawTable>, AppError> {
        self.raw.get(id).ok_or_else(|| {
            warn!("Unknown or expired dataset id: {}", id);
            AppError::NotFound(format!("dataset {}", id))
        })
    }

    /// Stores the sanitized dataset, replacing any earlier one for `id`.
    pub fn insert_clean(&self, id: &str, dataset: Dataset) -> Arc<Dataset> {
        let dataset = Arc::new(dataset);
        self.clean.insert(id.to_string(), Arc::clone(&dataset));
        debug!("Stored sanitized dataset {} ({} records)", id, dataset.records().len());
        dataset
    }

    pub fn clean(&self, id: &str) -> Result<Arc<Dataset>, AppError> {
        if let Some(dataset) = self.clean.get(id) {
            return Ok(dataset);
        }
        if self.raw.contains_key(id) {
            Err(AppError::InvalidInput(format!(
                "dataset {} has not been prepared with a column mapping yet",
                id
            )))
        } else {
            Err(AppError::NotFound(format!("dataset {}", id)))
        }
    }
}
