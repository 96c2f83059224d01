//! Progress aggregation over registry snapshots
//!
//! Read-only projections for the display layer: an overall completion
//! percentage and a per-status histogram. Both fold over a snapshot from the
//! [`crate::registry::ItemRegistry`] and never mutate anything.

use serde::{Deserialize, Serialize};

use crate::types::{ItemStatus, ProcessingState};

/// Per-status item counts for display
///
/// `Downloading` and `Uploading` collapse into the single `processing` bucket;
/// the dashboard does not distinguish them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Items not yet started
    pub pending: usize,
    /// Items currently downloading or uploading
    pub processing: usize,
    /// Items sleeping before a retry or pacing slot
    pub waiting: usize,
    /// Items that completed
    pub completed: usize,
    /// Items that failed
    pub failed: usize,
}

/// Overall completion percentage, the rounded mean of per-item progress.
///
/// An empty snapshot yields 0 rather than dividing by zero.
pub fn overall_progress(states: &[ProcessingState]) -> u8 {
    if states.is_empty() {
        return 0;
    }
    let sum: u32 = states.iter().map(|s| u32::from(s.progress)).sum();
    let mean = f64::from(sum) / states.len() as f64;
    mean.round() as u8
}

/// Fold a snapshot into a fixed-key status histogram
pub fn status_counts(states: &[ProcessingState]) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for state in states {
        match state.status {
            ItemStatus::Pending => counts.pending += 1,
            ItemStatus::Downloading | ItemStatus::Uploading => counts.processing += 1,
            ItemStatus::Waiting => counts.waiting += 1,
            ItemStatus::Completed => counts.completed += 1,
            ItemStatus::Failed => counts.failed += 1,
        }
    }
    counts
}
