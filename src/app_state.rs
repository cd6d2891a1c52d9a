//! Application state shared between request handlers.

use crate::dataset::{self, Table};
use crate::error::AquaviewError;
use crate::inspector;

use bytes::Bytes;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

/// Shared application state, cheap to clone into handlers.
pub type SharedAppState = Arc<AppState>;

/// Application state: the dataset handle and any caches derived from it.
#[derive(Debug)]
pub struct AppState {
    pub dataset: DatasetHandle,
}

impl AppState {
    /// Load the dataset and build the shared state. Fails fast if the
    /// dataset cannot be read, decoded or validated.
    pub fn new(path: PathBuf, image_column: &str) -> Result<SharedAppState, AquaviewError> {
        Ok(Arc::new(AppState {
            dataset: DatasetHandle::new(path, image_column)?,
        }))
    }
}

/// Result of an explicit dataset reload.
#[derive(Debug, Serialize)]
pub struct ReloadOutcome {
    /// Monotonic load counter, starting at 1 for the initial load
    pub generation: u64,
    pub rows: usize,
    pub digest: String,
}

#[derive(Debug)]
struct LoadedTable {
    table: Arc<Table>,
    generation: u64,
}

/// Handle to the loaded imagery table.
///
/// The table is immutable once loaded; consumers take an `Arc` snapshot and
/// are unaffected by a concurrent reload. The CSV export is cached against
/// the table's content digest, so repeated exports of an unchanged table are
/// free and a reload naturally invalidates the cache.
#[derive(Debug)]
pub struct DatasetHandle {
    path: PathBuf,
    image_column: String,
    loaded: RwLock<LoadedTable>,
    csv_cache: Mutex<Option<(String, Bytes)>>,
}

impl DatasetHandle {
    /// Load the dataset from `path` and wrap it in a handle.
    pub fn new(path: PathBuf, image_column: &str) -> Result<Self, AquaviewError> {
        let table = dataset::load(&path, image_column)?;
        Ok(Self {
            path,
            image_column: image_column.to_string(),
            loaded: RwLock::new(LoadedTable {
                table: Arc::new(table),
                generation: 1,
            }),
            csv_cache: Mutex::new(None),
        })
    }

    /// A snapshot of the current table.
    pub fn table(&self) -> Arc<Table> {
        let guard = self.loaded.read().unwrap_or_else(|err| err.into_inner());
        Arc::clone(&guard.table)
    }

    /// The current load generation.
    pub fn generation(&self) -> u64 {
        let guard = self.loaded.read().unwrap_or_else(|err| err.into_inner());
        guard.generation
    }

    /// Re-read the dataset from its backing file and swap in the new table.
    ///
    /// On failure the previous table stays in place and keeps serving.
    pub fn reload(&self) -> Result<ReloadOutcome, AquaviewError> {
        let table = dataset::load(&self.path, &self.image_column)?;
        let outcome = {
            let mut guard = self.loaded.write().unwrap_or_else(|err| err.into_inner());
            guard.table = Arc::new(table);
            guard.generation += 1;
            ReloadOutcome {
                generation: guard.generation,
                rows: guard.table.rows(),
                digest: guard.table.digest().to_string(),
            }
        };
        tracing::info!(
            generation = outcome.generation,
            rows = outcome.rows,
            "reloaded imagery table"
        );
        Ok(outcome)
    }

    /// The table's CSV export, cached by content digest.
    pub fn csv(&self, table: &Table) -> Result<Bytes, AquaviewError> {
        {
            let guard = self.csv_cache.lock().unwrap_or_else(|err| err.into_inner());
            if let Some((digest, bytes)) = guard.as_ref() {
                if digest == table.digest() {
                    return Ok(bytes.clone());
                }
            }
        }
        // Encode outside the lock; exports of an unchanged table converge on
        // identical bytes, so a racing double encode is harmless.
        let bytes = Bytes::from(inspector::to_csv(table)?);
        let mut guard = self.csv_cache.lock().unwrap_or_else(|err| err.into_inner());
        *guard = Some((table.digest().to_string(), bytes.clone()));
        Ok(bytes)
    }
}
