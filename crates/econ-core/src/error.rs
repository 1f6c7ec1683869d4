//! Error types for the econ pipeline.

use std::collections::BTreeMap;

use econ_sources::SourceError;
use thiserror::Error;

/// Errors surfaced to callers of the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No source produced usable data.
    #[error("all sources failed: {}", summarize(.errors))]
    AllSourcesFailed {
        errors: BTreeMap<String, Vec<String>>,
    },

    /// The request failed validation before any source was contacted.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Bubbled-up source layer error.
    #[error("source error: {0}")]
    Source(#[from] SourceError),
}

impl PipelineError {
    /// Whether the whole fan-out is worth repeating.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::AllSourcesFailed { .. })
    }
}

fn summarize(errors: &BTreeMap<String, Vec<String>>) -> String {
    if errors.is_empty() {
        return "no source produced a dataset".to_string();
    }
    errors
        .iter()
        .map(|(source, messages)| format!("{source}: {}", messages.join("; ")))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// The text-analysis collaborator could not produce an analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis service unavailable: {0}")]
    Unavailable(String),

    #[error("analysis service returned no content")]
    EmptyResponse,

    #[error("analysis payload could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        AnalysisError::Unavailable(err.to_string())
    }
}

/// Convenience result alias.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
