//! HTTP-backed artifact resolution through the same-origin proxy

use async_trait::async_trait;
use regex::Regex;

use crate::config::ResolveConfig;
use crate::error::{Error, Result};
use crate::types::{CandidateItem, DownloadReference};

use super::{ArtifactResolver, build_client, parse_endpoint, upstream_error};

/// Resolver client against the dashboard's same-origin download proxy
///
/// The proxy exists because the platform blocks cross-origin downloads from
/// the browser; it validates the source URL server-side and rejects anything
/// off-pattern with a 4xx. The same pattern check runs here first so malformed
/// input fails fast without a round trip.
#[derive(Debug)]
pub struct HttpArtifactResolver {
    client: reqwest::Client,
    endpoint: url::Url,
    source_url_pattern: Regex,
}

/// Wire shape of a resolve response
#[derive(Debug, serde::Deserialize)]
struct ResolveResponse {
    download_url: String,
    #[serde(default)]
    file_name: Option<String>,
}

impl HttpArtifactResolver {
    /// Build a resolver from configuration
    pub fn new(config: &ResolveConfig) -> Result<Self> {
        let source_url_pattern =
            Regex::new(&config.source_url_pattern).map_err(|e| Error::Config {
                message: format!("invalid source URL pattern: {e}"),
                key: Some("resolve.source_url_pattern".to_string()),
            })?;

        Ok(Self {
            client: build_client(config.timeout)?,
            endpoint: parse_endpoint(&config.endpoint, "resolve.endpoint")?,
            source_url_pattern,
        })
    }
}

#[async_trait]
impl ArtifactResolver for HttpArtifactResolver {
    async fn resolve(&self, item: &CandidateItem) -> Result<DownloadReference> {
        if !self.source_url_pattern.is_match(&item.source_url) {
            return Err(Error::Validation(format!(
                "source URL '{}' does not match the platform pattern",
                item.source_url
            )));
        }

        tracing::debug!(item_id = %item.id, "Resolving download reference");

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("url", item.source_url.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }

        let body: ResolveResponse = response
            .json()
            .await
            .map_err(|e| Error::Malformed(format!("resolve response: {e}")))?;

        if body.download_url.is_empty() {
            return Err(Error::Malformed(
                "resolve response carried an empty download_url".to_string(),
            ));
        }

        let file_name = body
            .file_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("{}.mp4", item.id));

        Ok(DownloadReference {
            url: body.download_url,
            file_name,
        })
    }
}
