//! Pipeline driver — batch orchestration split into focused submodules.
//!
//! The `PipelineDriver` struct and its methods are organized by concern:
//! - [`batch`] - Batch loop with inter-item pacing and tallying
//! - [`item`] - Per-item stage sequence with the shared retry budget
//!
//! The driver owns the item registry (single writer), the event channel, and
//! the collaborator trait objects. Everything is `Arc`-wrapped so clones share
//! one pipeline; items run strictly sequentially on whichever task calls
//! [`PipelineDriver::run_batch`].

mod batch;
mod item;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::Result;
use crate::pacing::{CountdownPacer, Pacer};
use crate::progress::{self, StatusCounts};
use crate::profile::ProfileProvider;
use crate::providers::{
    ArtifactResolver, ArtifactStore, HttpArtifactResolver, HttpArtifactStore, HttpSearchProvider,
    SearchProvider,
};
use crate::registry::ItemRegistry;
use crate::types::{CandidateItem, Event, ItemId, ProcessingState, SearchFilters};

/// Buffer size for the event broadcast channel
const EVENT_CHANNEL_BUFFER: usize = 256;

/// The stage collaborators a driver runs against
///
/// Production wires up the `Http*` implementations via
/// [`PipelineDriver::new`]; tests inject fakes here.
pub struct Collaborators {
    /// Search collaborator
    pub search: Arc<dyn SearchProvider>,
    /// Artifact-resolution collaborator
    pub resolver: Arc<dyn ArtifactResolver>,
    /// Storage/upload collaborator
    pub store: Arc<dyn ArtifactStore>,
    /// Pacing policy; `None` uses the countdown pacer wired to the event channel
    pub pacer: Option<Arc<dyn Pacer>>,
}

/// Pipeline driver instance (cloneable - all fields are Arc-wrapped)
///
/// Owns the per-batch item registry and drives items through
/// `collect → download → upload → done` with bounded retry and fixed pacing.
/// The display layer subscribes to events and reads registry snapshots; it
/// never writes.
#[derive(Clone)]
pub struct PipelineDriver {
    /// Configuration (replaced wholesale by [`configure_for`](Self::configure_for))
    pub(crate) config: Arc<Config>,
    /// Item registry; the driver's current step is the only writer
    pub(crate) registry: Arc<std::sync::Mutex<ItemRegistry>>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Search collaborator
    pub(crate) search: Arc<dyn SearchProvider>,
    /// Artifact-resolution collaborator
    pub(crate) resolver: Arc<dyn ArtifactResolver>,
    /// Storage/upload collaborator
    pub(crate) store: Arc<dyn ArtifactStore>,
    /// Pacing policy for the fixed pre-resolve and inter-item delays
    pub(crate) pacer: Arc<dyn Pacer>,
    /// Cooperative cancellation; observed at pacing boundaries
    pub(crate) cancel_token: CancellationToken,
    /// Whether a batch is currently running
    pub(crate) running: Arc<AtomicBool>,
}

impl PipelineDriver {
    /// Create a driver with HTTP-backed collaborators built from the config
    pub fn new(config: Config) -> Result<Self> {
        let search = Arc::new(HttpSearchProvider::new(&config.search)?);
        let resolver = Arc::new(HttpArtifactResolver::new(&config.resolve)?);
        let store = Arc::new(HttpArtifactStore::new(&config.store)?);
        Self::with_collaborators(
            config,
            Collaborators {
                search,
                resolver,
                store,
                pacer: None,
            },
        )
    }

    /// Create a driver with injected collaborators
    pub fn with_collaborators(config: Config, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let (event_tx, _) = tokio::sync::broadcast::channel(EVENT_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();
        let pacer = collaborators.pacer.unwrap_or_else(|| {
            Arc::new(CountdownPacer::new(event_tx.clone(), cancel_token.clone()))
        });

        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(std::sync::Mutex::new(ItemRegistry::new())),
            event_tx,
            search: collaborators.search,
            resolver: collaborators.resolver,
            store: collaborators.store,
            pacer,
            cancel_token,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Subscribe to pipeline events
    ///
    /// Each subscriber receives every event from the moment of subscription;
    /// slow subscribers may observe lagged receives on the broadcast channel.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Collect candidate items for a keyword via the search collaborator
    pub async fn collect(
        &self,
        keyword: &str,
        count: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<CandidateItem>> {
        self.search.search(keyword, count, filters).await
    }

    /// Resolve and apply a user's saved settings before a batch
    pub async fn configure_for(
        &mut self,
        provider: &dyn ProfileProvider,
        user_id: &str,
    ) -> Result<()> {
        let settings = provider.resolve(user_id).await?;
        let mut config = (*self.config).clone();
        settings.apply(&mut config);
        config.validate()?;
        self.config = Arc::new(config);
        tracing::info!(user_id, "Applied profile settings");
        Ok(())
    }

    /// Snapshot of all item states in batch order, for display projections
    pub fn snapshot(&self) -> Vec<ProcessingState> {
        self.registry().snapshot()
    }

    /// Current state of one item, if known
    pub fn get_state(&self, id: &ItemId) -> Option<ProcessingState> {
        self.registry().get(id).cloned()
    }

    /// Overall completion percentage across the current batch
    pub fn overall_progress(&self) -> u8 {
        progress::overall_progress(&self.snapshot())
    }

    /// Per-status item counts for the current batch
    pub fn status_counts(&self) -> StatusCounts {
        progress::status_counts(&self.snapshot())
    }

    /// Whether a batch is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Request cooperative cancellation.
    ///
    /// The batch stops at the next pacing boundary. The in-flight item is
    /// abandoned as-is and unstarted items remain pending; no cleanup of
    /// partially uploaded artifacts is attempted.
    pub fn cancel(&self) {
        tracing::info!("Pipeline cancellation requested");
        self.cancel_token.cancel();
    }

    /// Lock the registry, recovering from a poisoned lock.
    ///
    /// The registry holds plain data, so a panic mid-update cannot leave it in
    /// a state worse than a dropped write.
    pub(crate) fn registry(&self) -> std::sync::MutexGuard<'_, ItemRegistry> {
        self.registry
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
