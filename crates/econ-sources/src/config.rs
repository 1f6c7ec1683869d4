//! Adapter configuration.
//!
//! Defaults read `ECON_*` environment variables and fall back to the public
//! agency endpoints.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Base URL per statistical agency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEndpoints {
    pub world_bank: String,
    pub imf: String,
    pub oecd: String,
    pub un: String,
}

impl Default for SourceEndpoints {
    fn default() -> Self {
        SourceEndpoints {
            world_bank: env_or("ECON_WORLD_BANK_URL", "https://api.worldbank.org/v2"),
            imf: env_or(
                "ECON_IMF_URL",
                "https://www.imf.org/external/datamapper/api/v1",
            ),
            oecd: env_or("ECON_OECD_URL", "https://stats.oecd.org/SDMX-JSON/data"),
            un: env_or("ECON_UN_URL", "https://data.un.org/ws/rest/data"),
        }
    }
}

impl SourceEndpoints {
    pub fn from_env() -> Self {
        Self::default()
    }
}

/// Cache, retry and HTTP settings applied to every adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// How long a transformed dataset stays valid in the cache
    pub cache_ttl: Duration,
    /// Retry schedule for the network fetch
    pub retry: RetryPolicy,
    /// Per-call HTTP timeout
    pub http_timeout: Duration,
    pub endpoints: SourceEndpoints,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            cache_ttl: Duration::from_secs(env_parse("ECON_CACHE_TTL_SECS", 3600)),
            retry: RetryPolicy::new(
                env_parse_u32("ECON_RETRY_ATTEMPTS", 3),
                Duration::from_millis(env_parse("ECON_RETRY_BASE_DELAY_MS", 1000)),
            ),
            http_timeout: Duration::from_secs(env_parse("ECON_HTTP_TIMEOUT_SECS", 20)),
            endpoints: SourceEndpoints::default(),
        }
    }
}

impl SourceConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_endpoints(mut self, endpoints: SourceEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

pub(crate) fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read a numeric environment variable, ignoring unparsable values.
pub fn env_parse(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// [`env_parse`] for counters; out-of-range values fall back to `default`.
pub fn env_parse_u32(key: &str, default: u32) -> u32 {
    u32::try_from(env_parse(key, u64::from(default))).unwrap_or(default)
}
