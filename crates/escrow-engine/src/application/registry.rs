//! # Swap Registry
//!
//! Index of `SwapRecord`s by id. Each record sits behind its own mutex so
//! operations on different swaps never contend; the index lock is only held
//! for lookups and inserts.
//!
//! Updates are transactional: the closure works on a copy, which replaces the
//! stored record (and is written through to the `SwapStore`) only when the
//! closure succeeds.

use crate::domain::{CoordinationState, EscrowError, EscrowResult, EscrowSide, SwapId, SwapRecord};
use crate::ports::outbound::SwapStore;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Shared, injectable store of swaps.
pub struct SwapRegistry {
    swaps: RwLock<HashMap<SwapId, Arc<Mutex<SwapRecord>>>>,
    store: Option<Arc<dyn SwapStore>>,
}

impl SwapRegistry {
    /// Memory-only registry.
    pub fn new() -> Self {
        Self {
            swaps: RwLock::new(HashMap::new()),
            store: None,
        }
    }

    /// Registry writing through to `store` on every commit.
    pub fn with_store(store: Arc<dyn SwapStore>) -> Self {
        Self {
            swaps: RwLock::new(HashMap::new()),
            store: Some(store),
        }
    }

    /// Rebuild from everything persisted in `store`.
    pub fn recover(store: Arc<dyn SwapStore>) -> EscrowResult<Self> {
        let records = store.load_all()?;
        let registry = Self::with_store(store);
        {
            let mut swaps = registry.swaps.write();
            for mut record in records {
                // A crash mid-call leaves nothing outstanding after restart.
                record.source.in_flight = None;
                record.destination.in_flight = None;
                swaps.insert(record.swap_id, Arc::new(Mutex::new(record)));
            }
        }
        info!(swaps = registry.len(), "[escrow] Registry recovered from store");
        Ok(registry)
    }

    /// Add a new swap. Fails with `DuplicateSwap` if the id is taken.
    pub fn insert(&self, record: SwapRecord) -> EscrowResult<()> {
        let mut swaps = self.swaps.write();
        if swaps.contains_key(&record.swap_id) {
            return Err(EscrowError::DuplicateSwap(record.swap_id));
        }
        self.persist(&record)?;
        swaps.insert(record.swap_id, Arc::new(Mutex::new(record)));
        Ok(())
    }

    /// Apply `f` to the swap under its lock and commit on success.
    pub fn update<R>(
        &self,
        swap_id: SwapId,
        f: impl FnOnce(&mut SwapRecord) -> EscrowResult<R>,
    ) -> EscrowResult<R> {
        let entry = self.entry(swap_id)?;
        let mut guard = entry.lock();
        let mut working = guard.clone();
        let out = f(&mut working)?;
        self.persist(&working)?;
        *guard = working;
        Ok(out)
    }

    /// Drop the in-flight marker for one side without persisting.
    pub fn clear_in_flight(&self, swap_id: SwapId, side: EscrowSide) {
        if let Ok(entry) = self.entry(swap_id) {
            entry.lock().escrow_mut(side).in_flight = None;
        }
    }

    /// Read-only snapshot.
    pub fn get_swap_state(&self, swap_id: SwapId) -> EscrowResult<SwapRecord> {
        Ok(self.entry(swap_id)?.lock().clone())
    }

    /// Snapshot of every swap.
    pub fn list(&self) -> Vec<SwapRecord> {
        self.entries().iter().map(|e| e.lock().clone()).collect()
    }

    /// Swaps currently in `state`.
    pub fn by_state(&self, state: CoordinationState) -> Vec<SwapRecord> {
        self.entries()
            .iter()
            .filter_map(|e| {
                let record = e.lock();
                (record.coordination_state == state).then(|| record.clone())
            })
            .collect()
    }

    /// Ids of swaps not yet Completed, Refunded or Failed.
    pub fn non_terminal_ids(&self) -> Vec<SwapId> {
        self.entries()
            .iter()
            .filter_map(|e| {
                let record = e.lock();
                (!record.is_terminal()).then_some(record.swap_id)
            })
            .collect()
    }

    /// Number of swaps.
    pub fn len(&self) -> usize {
        self.swaps.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.swaps.read().is_empty()
    }

    fn entry(&self, swap_id: SwapId) -> EscrowResult<Arc<Mutex<SwapRecord>>> {
        self.swaps
            .read()
            .get(&swap_id)
            .cloned()
            .ok_or(EscrowError::SwapNotFound(swap_id))
    }

    // Clone the Arcs so record locks are taken without the index lock held.
    fn entries(&self) -> Vec<Arc<Mutex<SwapRecord>>> {
        self.swaps.read().values().cloned().collect()
    }

    fn persist(&self, record: &SwapRecord) -> EscrowResult<()> {
        if let Some(store) = &self.store {
            store.save(record)?;
            debug!(swap_id = %record.swap_id, state = ?record.coordination_state, "[escrow] Swap committed");
        }
        Ok(())
    }
}

impl Default for SwapRegistry {
    fn default() -> Self {
        Self::new()
    }
}
