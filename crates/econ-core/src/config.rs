//! Pipeline configuration.

use std::str::FromStr;
use std::time::Duration;

use econ_sources::config::{env_parse, env_parse_u32};
use econ_sources::{RetryPolicy, SourceConfig};
use serde::{Deserialize, Serialize};

use crate::reconcile::MergePolicy;

/// Shape of `AggregatedResponse::datasets`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// One merged dataset
    #[default]
    Merged,
    /// Every normalized per-source dataset
    PerSource,
}

impl FromStr for PipelineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "merged" => Ok(PipelineMode::Merged),
            "per_source" => Ok(PipelineMode::PerSource),
            other => Err(format!("unknown output mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Deadline for one fan-out; sources still running are reported failed
    pub request_timeout: Duration,
    /// Schedule for repeating the whole fan-out after a total failure
    pub outer_retry: RetryPolicy,
    pub mode: PipelineMode,
    pub merge_policy: MergePolicy,
    pub sources: SourceConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            request_timeout: Duration::from_secs(env_parse("ECON_REQUEST_TIMEOUT_SECS", 30)),
            outer_retry: RetryPolicy::new(
                env_parse_u32("ECON_PIPELINE_ATTEMPTS", 3),
                Duration::from_millis(env_parse("ECON_PIPELINE_BASE_DELAY_MS", 1000)),
            ),
            mode: std::env::var("ECON_OUTPUT_MODE")
                .ok()
                .and_then(|m| m.parse().ok())
                .unwrap_or_default(),
            merge_policy: MergePolicy::default(),
            sources: SourceConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_outer_retry(mut self, retry: RetryPolicy) -> Self {
        self.outer_retry = retry;
        self
    }

    pub fn with_mode(mut self, mode: PipelineMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    pub fn with_sources(mut self, sources: SourceConfig) -> Self {
        self.sources = sources;
        self
    }
}
