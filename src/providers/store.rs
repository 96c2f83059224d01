//! HTTP-backed upload to the hosting backend

use async_trait::async_trait;
use serde::Serialize;

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::types::{DownloadReference, StoredArtifact};

use super::{ArtifactStore, build_client, parse_endpoint, upstream_error};

/// Upload client against the hosting backend's remote-URL upload API
///
/// The backend fetches the artifact itself from the resolved reference, so no
/// bytes flow through this process. The generous per-call timeout covers the
/// backend's server-side fetch of large artifacts.
pub struct HttpArtifactStore {
    client: reqwest::Client,
    endpoint: url::Url,
}

/// Wire shape of an upload request
#[derive(Debug, Serialize)]
struct StoreRequest<'a> {
    url: &'a str,
    file_name: &'a str,
}

/// Wire shape of an upload response
#[derive(Debug, serde::Deserialize)]
struct StoreResponse {
    page_url: String,
    #[serde(default)]
    direct_link: Option<String>,
    file_id: String,
}

impl HttpArtifactStore {
    /// Build an upload client from configuration
    pub fn new(config: &StoreConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout)?,
            endpoint: parse_endpoint(&config.endpoint, "store.endpoint")?,
        })
    }
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    async fn store(
        &self,
        reference: &DownloadReference,
        file_name: &str,
    ) -> Result<StoredArtifact> {
        if file_name.is_empty() {
            return Err(Error::Validation("upload file name is empty".to_string()));
        }

        tracing::debug!(file_name, "Uploading artifact");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&StoreRequest {
                url: &reference.url,
                file_name,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }

        let body: StoreResponse = response
            .json()
            .await
            .map_err(|e| Error::Malformed(format!("upload response: {e}")))?;

        Ok(StoredArtifact {
            page_url: body.page_url,
            direct_link: body.direct_link,
            file_id: body.file_id,
        })
    }
}
