//! Per-user profile resolution
//!
//! The hosted auth/DB provider owns user accounts and their saved dashboard
//! settings; this crate only consumes them. [`ProfileProvider`] is the
//! contract the driver consults before a batch starts, and
//! [`StaticProfileProvider`] is the in-memory implementation used in tests and
//! single-user deployments.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;
use crate::types::SearchFilters;

/// Per-user overrides applied to the driver configuration before a batch
///
/// `None` fields keep the configured value.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProfileSettings {
    /// Override for the per-item attempt budget
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Override for the inter-item pacing delay, in seconds
    #[serde(default)]
    pub inter_item_delay_secs: Option<u64>,

    /// Override for the pre-resolve pacing delay, in seconds
    #[serde(default)]
    pub pre_resolve_delay_secs: Option<u64>,

    /// The user's saved default search filters
    #[serde(default)]
    pub default_filters: SearchFilters,
}

impl ProfileSettings {
    /// Apply these overrides to a configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(max_retries) = self.max_retries {
            config.retry.max_retries = max_retries;
        }
        if let Some(secs) = self.inter_item_delay_secs {
            config.pacing.inter_item_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = self.pre_resolve_delay_secs {
            config.pacing.pre_resolve_delay = Duration::from_secs(secs);
        }
    }
}

/// Resolver for per-user pipeline settings
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    /// Resolve the settings saved for `user_id`.
    ///
    /// Unknown users resolve to default settings; the auth provider is the
    /// one deciding who exists, not this crate.
    async fn resolve(&self, user_id: &str) -> Result<ProfileSettings>;
}

/// In-memory profile provider
#[derive(Debug, Default)]
pub struct StaticProfileProvider {
    profiles: HashMap<String, ProfileSettings>,
}

impl StaticProfileProvider {
    /// Create an empty provider; every user resolves to defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Register settings for one user
    pub fn with_profile(mut self, user_id: impl Into<String>, settings: ProfileSettings) -> Self {
        self.profiles.insert(user_id.into(), settings);
        self
    }
}

#[async_trait]
impl ProfileProvider for StaticProfileProvider {
    async fn resolve(&self, user_id: &str) -> Result<ProfileSettings> {
        Ok(self.profiles.get(user_id).cloned().unwrap_or_default())
    }
}
