//! Configuration types for clip-relay

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Retry behavior for stage calls
///
/// One attempt budget is shared across both stages (resolve and store) of an
/// item, so `max_retries` bounds the total number of stage calls the item may
/// make before it is marked failed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum stage-call attempts per item before marking it failed (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay between attempts (default: 2s)
    #[serde(default = "default_base_delay", with = "duration_millis")]
    pub base_delay: Duration,

    /// Backoff schedule shape (default: linear)
    #[serde(default)]
    pub backoff: BackoffKind,

    /// Add random jitter to backoff delays to prevent thundering herd (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay: default_base_delay(),
            backoff: BackoffKind::default(),
            jitter: false,
        }
    }
}

/// Shape of the retry backoff schedule
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Same delay before every retry
    Constant,
    /// Delay grows as `base_delay × attempt`
    #[default]
    Linear,
}

impl BackoffKind {
    /// Delay before the retry following failed attempt number `attempt`
    /// (1-based)
    pub fn delay_for(&self, base: Duration, attempt: u32) -> Duration {
        match self {
            BackoffKind::Constant => base,
            BackoffKind::Linear => base.saturating_mul(attempt.max(1)),
        }
    }
}

/// Fixed pacing delays inserted to avoid upstream throttling
///
/// These are unconditional waits, not reactions to observed rate-limit
/// responses. They run through the driver's [`crate::pacing::Pacer`] so an
/// adaptive policy can replace them without touching driver control flow.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Delay between items, shown as a second-by-second countdown (default: 60s).
    /// Not applied before the first item.
    #[serde(default = "default_inter_item_delay", with = "duration_millis")]
    pub inter_item_delay: Duration,

    /// Mandatory wait before an item's first resolve attempt (default: 60s)
    #[serde(default = "default_pre_resolve_delay", with = "duration_millis")]
    pub pre_resolve_delay: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            inter_item_delay: default_inter_item_delay(),
            pre_resolve_delay: default_pre_resolve_delay(),
        }
    }
}

/// Search collaborator settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Search API endpoint
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Hard cap on the result set size regardless of the requested count (default: 20)
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Per-call HTTP timeout (default: 30s)
    #[serde(default = "default_search_timeout", with = "duration_millis")]
    pub timeout: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            max_results: default_max_results(),
            timeout: default_search_timeout(),
        }
    }
}

/// Artifact-resolution collaborator settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolveConfig {
    /// Same-origin proxy endpoint fronting the platform's download resolution
    #[serde(default = "default_resolve_endpoint")]
    pub endpoint: String,

    /// Pattern a source URL must match before resolution is attempted.
    /// Non-matching URLs fail validation immediately, without a retry.
    #[serde(default = "default_source_url_pattern")]
    pub source_url_pattern: String,

    /// Per-call HTTP timeout (default: 120s)
    #[serde(default = "default_resolve_timeout", with = "duration_millis")]
    pub timeout: Duration,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            endpoint: default_resolve_endpoint(),
            source_url_pattern: default_source_url_pattern(),
            timeout: default_resolve_timeout(),
        }
    }
}

/// Storage/upload collaborator settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Upload API endpoint (remote-URL upload)
    #[serde(default = "default_store_endpoint")]
    pub endpoint: String,

    /// Per-call HTTP timeout (default: 300s)
    #[serde(default = "default_store_timeout", with = "duration_millis")]
    pub timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_store_endpoint(),
            timeout: default_store_timeout(),
        }
    }
}

/// Main configuration for the pipeline driver
///
/// All sub-configs have working defaults; a `Config::default()` points at the
/// example collaborator endpoints and the canonical retry/pacing policy.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Retry budget and backoff schedule
    #[serde(default)]
    pub retry: RetryConfig,

    /// Fixed pacing delays
    #[serde(default)]
    pub pacing: PacingConfig,

    /// Search collaborator
    #[serde(default)]
    pub search: SearchConfig,

    /// Artifact-resolution collaborator
    #[serde(default)]
    pub resolve: ResolveConfig,

    /// Storage/upload collaborator
    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    /// Validate endpoint URLs and the source-URL pattern.
    ///
    /// Returns a [`Error::Config`] naming the offending key on the first
    /// invalid setting.
    pub fn validate(&self) -> Result<()> {
        for (key, endpoint) in [
            ("search.endpoint", &self.search.endpoint),
            ("resolve.endpoint", &self.resolve.endpoint),
            ("store.endpoint", &self.store.endpoint),
        ] {
            url::Url::parse(endpoint).map_err(|e| Error::Config {
                message: format!("invalid endpoint URL '{endpoint}': {e}"),
                key: Some(key.to_string()),
            })?;
        }

        regex::Regex::new(&self.resolve.source_url_pattern).map_err(|e| Error::Config {
            message: format!("invalid source URL pattern: {e}"),
            key: Some("resolve.source_url_pattern".to_string()),
        })?;

        Ok(())
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_millis(2000)
}

fn default_inter_item_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_pre_resolve_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_search_endpoint() -> String {
    "https://api.clips.example/v1/search".to_string()
}

fn default_max_results() -> usize {
    20
}

fn default_search_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_resolve_endpoint() -> String {
    "https://dashboard.example/api/resolve".to_string()
}

fn default_source_url_pattern() -> String {
    r"^https://(www\.)?clips\.example/(v|video)/[A-Za-z0-9_-]+".to_string()
}

fn default_resolve_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_store_endpoint() -> String {
    "https://filehost.example/api/upload".to_string()
}

fn default_store_timeout() -> Duration {
    Duration::from_secs(300)
}

/// Serialize `Duration` fields as integer milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
