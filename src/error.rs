//! Error types for clip-relay
//!
//! This module provides error handling for the library, including:
//! - An error taxonomy organized by origin (validation, transport, upstream)
//! - An advisory `retry_after` hint surfaced from upstream rate-limit responses
//! - Conversions from transport and serialization errors

use std::time::Duration;
use thiserror::Error;

/// Result type alias for clip-relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for clip-relay
///
/// Variants are classified by origin rather than by exception type. The retry
/// layer consults [`crate::retry::IsRetryable`] to decide whether a variant is
/// transient; validation and configuration errors are always permanent.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or disallowed input (e.g. a source URL that does not match
    /// the platform pattern). Surfaced immediately, never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// Transport-level failure (connection error, timeout). A timeout is not
    /// a distinct kind — it classifies the same as any other transport error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-success response from an upstream collaborator
    #[error("upstream error ({status}): {message}")]
    Upstream {
        /// HTTP status code returned by the collaborator
        status: u16,
        /// Response body or status text
        message: String,
        /// Advisory backoff hint parsed from a `Retry-After` header.
        ///
        /// The pipeline driver runs a fixed retry schedule and does not honor
        /// this hint; it is carried for observability and future use.
        retry_after: Option<Duration>,
    },

    /// Upstream response decoded but did not have the expected shape
    #[error("malformed upstream response: {0}")]
    Malformed(String),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "search.endpoint")
        key: Option<String>,
    },

    /// Requested entity does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The batch was cancelled before this operation could run
    #[error("batch cancelled")]
    Cancelled,
}

impl Error {
    /// Build an upstream error from a status code and message, without a
    /// backoff hint.
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Advisory backoff hint attached to this error, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Upstream { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
