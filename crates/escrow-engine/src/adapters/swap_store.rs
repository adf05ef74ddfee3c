//! Swap Store Adapters
//!
//! Implements the `SwapStore` port in memory and as one JSON file per swap.

use crate::domain::{EscrowError, EscrowResult, SwapId, SwapRecord};
use crate::ports::outbound::SwapStore;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

fn storage_error(err: impl std::fmt::Display) -> EscrowError {
    EscrowError::Storage {
        reason: err.to_string(),
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct InMemorySwapStore {
    records: RwLock<HashMap<SwapId, SwapRecord>>,
    saves: RwLock<u64>,
}

impl InMemorySwapStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save` calls so far.
    pub fn save_count(&self) -> u64 {
        *self.saves.read()
    }

    /// Last saved version of a record.
    pub fn get(&self, swap_id: &SwapId) -> Option<SwapRecord> {
        self.records.read().get(swap_id).cloned()
    }
}

impl SwapStore for InMemorySwapStore {
    fn save(&self, record: &SwapRecord) -> EscrowResult<()> {
        self.records.write().insert(record.swap_id, record.clone());
        *self.saves.write() += 1;
        Ok(())
    }

    fn load_all(&self) -> EscrowResult<Vec<SwapRecord>> {
        Ok(self.records.read().values().cloned().collect())
    }
}

/// One `<swap_id>.json` file per swap under a directory.
///
/// Writes go to a temp file first and are renamed into place, so a crash
/// never leaves a half-written record behind.
pub struct JsonFileSwapStore {
    dir: PathBuf,
}

impl JsonFileSwapStore {
    /// Open (and create if needed) the store directory.
    pub fn open(dir: impl AsRef<Path>) -> EscrowResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(storage_error)?;
        Ok(Self { dir })
    }

    /// Store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, swap_id: &SwapId) -> PathBuf {
        self.dir.join(format!("{}.json", swap_id.to_hex()))
    }
}

impl SwapStore for JsonFileSwapStore {
    fn save(&self, record: &SwapRecord) -> EscrowResult<()> {
        let path = self.path_for(&record.swap_id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(record).map_err(storage_error)?;
        fs::write(&tmp, bytes).map_err(storage_error)?;
        fs::rename(&tmp, &path).map_err(storage_error)?;
        debug!(swap_id = %record.swap_id, path = %path.display(), "[escrow] Swap persisted");
        Ok(())
    }

    fn load_all(&self) -> EscrowResult<Vec<SwapRecord>> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(storage_error)? {
            let path = entry.map_err(storage_error)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path).map_err(storage_error)?;
            match serde_json::from_slice::<SwapRecord>(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "[escrow] Skipping unreadable swap file");
                }
            }
        }
        Ok(records)
    }
}
