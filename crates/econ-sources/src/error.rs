//! Error types for econ-sources

use thiserror::Error;

use crate::schema::DataSource;

/// Errors that can occur while fetching or transforming agency data
#[derive(Error, Debug)]
pub enum SourceError {
    /// Indicator key has no mapping for this source
    #[error("{provider} does not support indicator '{indicator}'. Available indicators are: {}", .supported.join(", "))]
    UnsupportedIndicator {
        provider: DataSource,
        indicator: String,
        supported: Vec<String>,
    },

    /// Remote endpoint answered with a non-success status
    #[error("{provider} API error (status {status}): {body}")]
    Upstream {
        provider: DataSource,
        status: u16,
        body: String,
    },

    /// Remote endpoint answered with a body that is not JSON
    #[error("{provider} API returned an unreadable body: {reason}")]
    UnreadableBody { provider: DataSource, reason: String },

    /// Decoded payload does not have the shape the adapter expects
    #[error("{provider} API returned a malformed payload: {reason}")]
    MalformedPayload { provider: DataSource, reason: String },

    /// Transport-level HTTP failure (connect, TLS, decode)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Request parameters failed validation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The request deadline elapsed before the source answered
    #[error("{provider}: request deadline exceeded")]
    DeadlineExceeded { provider: DataSource },

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SourceError {
    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SourceError::Upstream { .. }
                | SourceError::UnreadableBody { .. }
                | SourceError::Http(_)
                | SourceError::DeadlineExceeded { .. }
        )
    }

    pub(crate) fn malformed(provider: DataSource, reason: impl Into<String>) -> Self {
        SourceError::MalformedPayload {
            provider,
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Http(err.to_string())
    }
}
