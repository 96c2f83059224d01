//! Stage executors — the three external collaborators behind trait seams
//!
//! Each stage of the pipeline wraps exactly one external HTTP call and
//! normalizes the outcome into the crate's `Result` envelope:
//! - [`SearchProvider`] — collect candidate items for a keyword
//! - [`ArtifactResolver`] — resolve a downloadable reference through the
//!   same-origin proxy
//! - [`ArtifactStore`] — upload the resolved artifact to the hosting backend
//!
//! The traits keep the driver independent of transport details; tests inject
//! in-memory fakes, production wires up the `Http*` implementations built from
//! [`crate::config::Config`].

mod resolve;
mod search;
mod store;

pub use resolve::HttpArtifactResolver;
pub use search::HttpSearchProvider;
pub use store::HttpArtifactStore;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{CandidateItem, DownloadReference, SearchFilters, StoredArtifact};

/// Search collaborator: collect candidate items matching a keyword
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Return candidates matching `keyword`, bounded by `count` and the
    /// provider's hard result cap, after applying `filters`. No pagination.
    async fn search(
        &self,
        keyword: &str,
        count: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<CandidateItem>>;
}

/// Artifact-resolution collaborator: obtain a downloadable reference
#[async_trait]
pub trait ArtifactResolver: Send + Sync {
    /// Resolve a downloadable reference for the item.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] without any network call when the item's
    /// source URL does not match the platform pattern.
    async fn resolve(&self, item: &CandidateItem) -> Result<DownloadReference>;
}

/// Storage/upload collaborator: persist the artifact on the hosting backend
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Upload the referenced artifact under `file_name` and return the
    /// durable hosted reference.
    async fn store(
        &self,
        reference: &DownloadReference,
        file_name: &str,
    ) -> Result<StoredArtifact>;
}

/// Normalize a non-success HTTP response into [`Error::Upstream`], parsing an
/// advisory `Retry-After` header when present.
pub(crate) async fn upstream_error(response: reqwest::Response) -> Error {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs);

    let mut message = response.text().await.unwrap_or_default();
    if message.is_empty() {
        message = status
            .canonical_reason()
            .unwrap_or("upstream request failed")
            .to_string();
    }

    Error::Upstream {
        status: status.as_u16(),
        message,
        retry_after,
    }
}

/// Build a reqwest client with the per-call timeout for one collaborator
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(Error::Network)
}

/// Parse a collaborator endpoint, naming the offending config key on failure
pub(crate) fn parse_endpoint(endpoint: &str, key: &str) -> Result<url::Url> {
    url::Url::parse(endpoint).map_err(|e| Error::Config {
        message: format!("invalid endpoint URL '{endpoint}': {e}"),
        key: Some(key.to_string()),
    })
}
