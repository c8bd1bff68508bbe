//! Local fallback store for batches that exhausted the sink retry ceiling.
//!
//! Batches land here as JSON files for manual replay (`aipulse-cli replay`).
//! Persisting never loses the dimension/fact split, so a replayed batch goes
//! through the same dimensions-before-facts commit path.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::rows::StagedBatch;
use crate::WarehouseError;

static SEQ: AtomicU64 = AtomicU64::new(0);

/// Directory of serialized [`StagedBatch`] files.
#[derive(Debug, Clone)]
pub struct FallbackStore {
    dir: PathBuf,
}

impl FallbackStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a staged batch, returning the file it was written to.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::FallbackIo`] on filesystem errors or
    /// [`WarehouseError::FallbackSerde`] if the batch cannot be serialized.
    pub fn persist(&self, batch: &StagedBatch) -> Result<PathBuf, WarehouseError> {
        fs::create_dir_all(&self.dir)?;
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        let seq = SEQ.fetch_add(1, Ordering::SeqCst);
        let path = self.dir.join(format!("batch-{nanos}-{seq}.json"));
        let json = serde_json::to_vec_pretty(batch)?;
        fs::write(&path, json)?;
        tracing::warn!(
            path = %path.display(),
            facts = batch.facts.len(),
            dimensions = batch.dimensions.len(),
            "batch persisted to fallback store"
        );
        Ok(path)
    }

    /// All persisted batch files, oldest first.
    ///
    /// An empty or missing directory yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::FallbackIo`] on filesystem errors.
    pub fn list(&self) -> Result<Vec<PathBuf>, WarehouseError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Load one persisted batch.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::FallbackIo`] if the file cannot be read or
    /// [`WarehouseError::FallbackSerde`] if it does not parse.
    pub fn load(&self, path: &Path) -> Result<StagedBatch, WarehouseError> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Remove a batch file after a successful replay.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::FallbackIo`] if the file cannot be removed.
    pub fn remove(&self, path: &Path) -> Result<(), WarehouseError> {
        fs::remove_file(path)?;
        Ok(())
    }
}
