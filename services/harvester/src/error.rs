//! Error types for harvesting operations

use thiserror::Error;

use crate::auth::Source;

/// Longest body excerpt carried in an [`HarvestError::Upstream`]
const BODY_EXCERPT_CHARS: usize = 500;

/// Errors that can occur while harvesting from an upstream service
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Credentials missing or rejected during token exchange
    #[error("Authentication failed for {upstream}: {message}")]
    Auth { upstream: Source, message: String },

    /// Non-2xx status, malformed JSON or an unexpected response shape
    #[error("Upstream error from {endpoint}{}: {message}", .status.map(|s| format!(" (status {})", s)).unwrap_or_default())]
    Upstream {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    /// The request never produced a response (connect failure, timeout)
    #[error("Request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    /// Bulk enrichment accepts at most `limit` identifiers per call
    #[error("Batch of {size} identifiers exceeds the upstream limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    /// Configuration file unreadable or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Domain-to-organization mapping unreadable or invalid
    #[error("Domain mapping error: {0}")]
    Mapping(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type HarvestResult<T> = Result<T, HarvestError>;

impl HarvestError {
    pub(crate) fn auth(upstream: Source, message: impl Into<String>) -> Self {
        HarvestError::Auth {
            upstream,
            message: message.into(),
        }
    }

    /// Build an upstream error from a non-2xx reply, keeping a short body excerpt
    pub(crate) fn status(endpoint: &str, status: u16, body: &str) -> Self {
        HarvestError::Upstream {
            endpoint: endpoint.to_string(),
            status: Some(status),
            message: excerpt(body),
        }
    }

    pub(crate) fn malformed(endpoint: &str, message: impl Into<String>) -> Self {
        HarvestError::Upstream {
            endpoint: endpoint.to_string(),
            status: None,
            message: message.into(),
        }
    }

    pub(crate) fn transport(endpoint: &str, err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("timed out: {}", err)
        } else {
            err.to_string()
        };
        HarvestError::Transport {
            endpoint: endpoint.to_string(),
            message,
        }
    }

    /// Whether a retry policy may try the call again
    ///
    /// Only upstream and transport failures are transient. Auth, batch-size
    /// and local configuration errors are fatal to the calling operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HarvestError::Upstream { .. } | HarvestError::Transport { .. }
        )
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}
