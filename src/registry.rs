//! Item registry — per-item processing state for the current batch
//!
//! A keyed mapping from [`ItemId`] to [`ProcessingState`], owned by the
//! pipeline driver. There is exactly one writer (the driver's current step);
//! the display layer only reads snapshots. A new batch replaces the whole
//! registry, so entries are never destroyed individually.

use std::collections::HashMap;

use crate::types::{ItemId, ItemStatus, ProcessingState, StatePatch};

/// Registry of per-item pipeline state, in batch order
#[derive(Debug, Default)]
pub struct ItemRegistry {
    entries: HashMap<ItemId, ProcessingState>,
    order: Vec<ItemId>,
}

impl ItemRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the registry for a new batch, setting every item to
    /// `Pending` with zero progress. Previous batch state is discarded.
    pub fn initialize<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = ItemId>,
    {
        self.entries.clear();
        self.order.clear();
        for id in items {
            // Duplicate IDs collapse onto one entry; keep the first position
            if self.entries.contains_key(&id) {
                continue;
            }
            self.order.push(id.clone());
            self.entries.insert(id.clone(), ProcessingState::new(id));
        }
    }

    /// Merge a partial state into an existing entry.
    ///
    /// A missing key is a silent skip, not an error — updates may race a batch
    /// reset and the stale write is simply dropped. Invariants are enforced on
    /// every merge: completing an item clears its error and pins progress at
    /// 100, and progress can never exceed 100 otherwise.
    pub fn update(&mut self, id: &ItemId, patch: StatePatch) {
        let Some(state) = self.entries.get_mut(id) else {
            tracing::debug!(item_id = %id, "Update for unknown item skipped");
            return;
        };

        if let Some(status) = patch.status {
            state.status = status;
        }
        if let Some(progress) = patch.progress {
            state.progress = progress.min(100);
        }
        if let Some(error) = patch.error {
            state.error = Some(error);
        }
        if let Some(result) = patch.result {
            state.result = Some(result);
        }
        if let Some(attempt) = patch.attempt {
            state.attempt = attempt;
        }

        if state.status == ItemStatus::Completed {
            state.progress = 100;
            state.error = None;
        } else if state.progress == 100 {
            // progress 100 is reserved for Completed
            state.progress = 99;
        }
    }

    /// Current state of one item, or `None` if the key is unknown
    pub fn get(&self, id: &ItemId) -> Option<&ProcessingState> {
        self.entries.get(id)
    }

    /// Snapshot of all entries in batch order, for display projections
    pub fn snapshot(&self) -> Vec<ProcessingState> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .cloned()
            .collect()
    }

    /// Number of items in the current batch
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the registry holds no items
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
