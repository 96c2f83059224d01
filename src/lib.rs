//! # clip-relay
//!
//! Backend library for collect/download/re-upload content dashboards.
//!
//! ## Design Philosophy
//!
//! clip-relay is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Strictly sequential** - Items run one at a time behind fixed pacing
//!   delays, keeping the upstream platforms from throttling the account
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Pluggable at the seams** - Collaborators and pacing sit behind traits
//!   so tests and adaptive policies can swap them out
//!
//! ## Quick Start
//!
//! ```no_run
//! use clip_relay::{Config, PipelineDriver, SearchFilters};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let driver = PipelineDriver::new(Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = driver.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let filters = SearchFilters {
//!         max_duration_secs: Some(120),
//!         ..SearchFilters::default()
//!     };
//!     let items = driver.collect("cats", 10, &filters).await?;
//!     let report = driver.run_batch(items).await;
//!     println!("{} succeeded, {} failed", report.success_count, report.failure_count);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Pacing delays between pipeline operations
pub mod pacing;
/// Pipeline driver (decomposed into focused submodules)
pub mod pipeline;
/// Per-user profile resolution
pub mod profile;
/// Progress aggregation over registry snapshots
pub mod progress;
/// Stage executors for the external collaborators
pub mod providers;
/// Item registry with per-item processing state
pub mod registry;
/// Retry logic with bounded attempts and configurable backoff
pub mod retry;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{BackoffKind, Config, PacingConfig, ResolveConfig, RetryConfig, SearchConfig, StoreConfig};
pub use error::{Error, Result};
pub use pacing::{CountdownPacer, NoOpPacer, Pacer};
pub use pipeline::{Collaborators, PipelineDriver};
pub use profile::{ProfileProvider, ProfileSettings, StaticProfileProvider};
pub use progress::{StatusCounts, overall_progress, status_counts};
pub use providers::{
    ArtifactResolver, ArtifactStore, HttpArtifactResolver, HttpArtifactStore, HttpSearchProvider,
    SearchProvider,
};
pub use registry::ItemRegistry;
pub use retry::{IsRetryable, RetryBudget, run_with_retry};
pub use types::{
    BatchReport, CandidateItem, DownloadReference, Event, ItemId, ItemStatus, ProcessingState,
    SearchFilters, StatePatch, StoredArtifact,
};
