//! Core types for clip-relay

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for an item flowing through the pipeline
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    /// Create a new ItemId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Processing status of a single item
///
/// Exactly one status holds at a time. `Waiting` is transient: it covers both
/// the pre-retry backoff sleep and the pacing countdown before the item starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Created, not yet picked up by the driver
    Pending,
    /// Resolving and fetching the downloadable artifact
    Downloading,
    /// Uploading the artifact to the hosting backend
    Uploading,
    /// Sleeping before a retry or the next pacing slot
    Waiting,
    /// Terminal success
    Completed,
    /// Terminal failure
    Failed,
}

impl ItemStatus {
    /// Whether this status is terminal (no further transitions)
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed)
    }
}

/// Current pipeline state of one item
///
/// Invariants (enforced by the registry on every merge):
/// - `Completed` implies `result` is present and `error` is absent
/// - `Failed` implies `error` is present
/// - `progress == 100` if and only if status is `Completed`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessingState {
    /// Registry key
    pub item_id: ItemId,
    /// Current status
    pub status: ItemStatus,
    /// Progress percentage, 0–100, non-decreasing within a pass except on
    /// reset-to-retry
    pub progress: u8,
    /// Error message, present only when status is `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Hosted artifact reference, populated only on terminal success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<StoredArtifact>,
    /// Number of failed stage attempts so far (shared across both stages)
    pub attempt: u32,
}

impl ProcessingState {
    /// Create a fresh entry in `Pending` with zero progress
    pub fn new(item_id: ItemId) -> Self {
        Self {
            item_id,
            status: ItemStatus::Pending,
            progress: 0,
            error: None,
            result: None,
            attempt: 0,
        }
    }
}

/// Partial update merged into a [`ProcessingState`] by the registry
///
/// `None` fields leave the stored value untouched, so an empty patch is a
/// no-op. `error` and `result` only ever move from absent to present through a
/// patch; the registry clears `error` itself when a status patch makes the
/// invariants require it.
#[derive(Clone, Debug, Default)]
pub struct StatePatch {
    /// New status, if changing
    pub status: Option<ItemStatus>,
    /// New progress percentage, if changing
    pub progress: Option<u8>,
    /// Error message to record
    pub error: Option<String>,
    /// Hosted artifact to record
    pub result: Option<StoredArtifact>,
    /// New failed-attempt count
    pub attempt: Option<u32>,
}

impl StatePatch {
    /// Patch that only changes the status
    pub fn status(status: ItemStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Set the progress percentage on this patch
    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Set the failed-attempt count on this patch
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }
}

/// A collected candidate item returned by the search collaborator
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    /// Platform-assigned identifier, unique within a batch
    pub id: ItemId,
    /// Item title
    pub title: String,
    /// Item description (blacklist filtering matches against this)
    #[serde(default)]
    pub description: String,
    /// Author or channel name
    #[serde(default)]
    pub author: String,
    /// Duration in seconds
    pub duration_secs: u64,
    /// Platform tags (blacklist filtering matches against these too)
    #[serde(default)]
    pub tags: Vec<String>,
    /// Canonical URL of the item on the source platform
    pub source_url: String,
}

/// Inclusion and exclusion filters applied when collecting candidates
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Minimum duration in seconds (inclusive), if bounded
    #[serde(default)]
    pub min_duration_secs: Option<u64>,
    /// Maximum duration in seconds (inclusive), if bounded
    #[serde(default)]
    pub max_duration_secs: Option<u64>,
    /// Keyword blacklist, matched case-insensitively as substrings of the
    /// description and tags
    #[serde(default)]
    pub blacklist: Vec<String>,
}

impl SearchFilters {
    /// Whether a candidate passes the duration bounds and blacklist
    pub fn allows(&self, item: &CandidateItem) -> bool {
        if let Some(min) = self.min_duration_secs {
            if item.duration_secs < min {
                return false;
            }
        }
        if let Some(max) = self.max_duration_secs {
            if item.duration_secs > max {
                return false;
            }
        }
        !self.is_blacklisted(item)
    }

    fn is_blacklisted(&self, item: &CandidateItem) -> bool {
        if self.blacklist.is_empty() {
            return false;
        }
        let description = item.description.to_lowercase();
        let tags: Vec<String> = item.tags.iter().map(|t| t.to_lowercase()).collect();
        self.blacklist.iter().any(|word| {
            let word = word.to_lowercase();
            description.contains(&word) || tags.iter().any(|t| t.contains(&word))
        })
    }
}

/// A resolved downloadable reference for an item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadReference {
    /// Direct download URL (typically behind the same-origin proxy)
    pub url: String,
    /// Suggested file name for the artifact
    pub file_name: String,
}

/// Durable reference returned by the hosting backend on upload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredArtifact {
    /// Hosted page URL
    pub page_url: String,
    /// Direct download link, if the backend provides one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct_link: Option<String>,
    /// Backend-assigned file identifier
    pub file_id: String,
}

/// Final outcome of a batch run
///
/// Delivered only after the full item list is exhausted; per-item failures are
/// tallied, never propagated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchReport {
    /// Items that reached `Completed`, in processing order
    pub succeeded: Vec<ItemId>,
    /// Number of items that completed
    pub success_count: usize,
    /// Number of items that failed
    pub failure_count: usize,
    /// When the batch started
    pub started_at: DateTime<Utc>,
    /// When the batch finished
    pub finished_at: DateTime<Utc>,
}

/// Event emitted during pipeline execution
///
/// Consumers subscribe through [`crate::pipeline::PipelineDriver::subscribe`]
/// and render these instead of polling registry snapshots.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A batch run started
    BatchStarted {
        /// Number of items in the batch
        total: usize,
    },

    /// The driver picked up an item
    ItemStarted {
        /// Item ID
        id: ItemId,
        /// Zero-based position within the batch
        position: usize,
    },

    /// Item entered the download stage
    Downloading {
        /// Item ID
        id: ItemId,
    },

    /// Item entered the upload stage
    Uploading {
        /// Item ID
        id: ItemId,
    },

    /// A stage call failed and a retry was scheduled
    RetryScheduled {
        /// Item ID
        id: ItemId,
        /// Failed-attempt count after this failure
        attempt: u32,
        /// Configured attempt budget
        max_retries: u32,
        /// Backoff delay before the retry, in milliseconds
        delay_ms: u64,
        /// Error message from the failed attempt
        error: String,
    },

    /// A pacing countdown started
    PacingStarted {
        /// Total countdown length in seconds
        seconds: u64,
    },

    /// One second of a pacing countdown elapsed
    PacingTick {
        /// Seconds remaining
        remaining_secs: u64,
    },

    /// Item reached terminal success
    ItemCompleted {
        /// Item ID
        id: ItemId,
        /// Hosted artifact
        artifact: StoredArtifact,
    },

    /// Item reached terminal failure; the batch continues
    ItemFailed {
        /// Item ID
        id: ItemId,
        /// Error message
        error: String,
    },

    /// The batch finished; counts always reported, failures included
    BatchCompleted {
        /// Number of items that completed
        success_count: usize,
        /// Number of items that failed
        failure_count: usize,
    },

    /// The batch was cancelled; unstarted items remain pending
    BatchCancelled,
}
