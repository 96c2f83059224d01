//! HTTP-backed search collaborator

use async_trait::async_trait;

use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::types::{CandidateItem, SearchFilters};

use super::{SearchProvider, build_client, parse_endpoint, upstream_error};

/// Search client against the platform's search API
///
/// The result set is capped at the configured maximum regardless of the
/// requested count; the dashboard never needs more than one screenful and the
/// upstream service throttles deep result pulls.
pub struct HttpSearchProvider {
    client: reqwest::Client,
    endpoint: url::Url,
    max_results: usize,
}

/// Wire shape of a search response
#[derive(Debug, serde::Deserialize)]
struct SearchResponse {
    items: Vec<CandidateItem>,
}

impl HttpSearchProvider {
    /// Build a search provider from configuration
    pub fn new(config: &SearchConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout)?,
            endpoint: parse_endpoint(&config.endpoint, "search.endpoint")?,
            max_results: config.max_results,
        })
    }
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    async fn search(
        &self,
        keyword: &str,
        count: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<CandidateItem>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(Error::Validation("search keyword is empty".to_string()));
        }

        let cap = count.min(self.max_results);
        tracing::debug!(keyword, count = cap, "Searching for candidates");

        let count_param = cap.to_string();
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("keyword", keyword), ("count", count_param.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::Malformed(format!("search response: {e}")))?;

        let items: Vec<CandidateItem> = body
            .items
            .into_iter()
            .filter(|item| filters.allows(item))
            .take(cap)
            .collect();

        tracing::info!(keyword, collected = items.len(), "Search completed");
        Ok(items)
    }
}
