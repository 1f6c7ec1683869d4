//! Source adapter trait and the retry/cache wrapper around it.
//!
//! An adapter translates a [`QueryParams`] into one agency-specific call
//! (`fetch_data`) and the agency payload back into a [`Dataset`]
//! (`transform_data`). [`CachedSource`] decorates any adapter with a TTL cache
//! and bounded exponential-backoff retry of the fetch step.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::cache::{cache_key, TtlCache};
use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::retry::RetryPolicy;
use crate::schema::{DataSource, Dataset, QueryParams};
use crate::Result;

/// Static mapping from indicator keys to one source's indicator codes.
#[derive(Debug, Clone)]
pub struct IndicatorTable {
    entries: Vec<(&'static str, &'static str)>,
}

impl IndicatorTable {
    pub fn new(entries: &[(&'static str, &'static str)]) -> Self {
        let mut entries = entries.to_vec();
        entries.sort_by_key(|(key, _)| *key);
        Self { entries }
    }

    /// Case-insensitive lookup; `_` and spaces are interchangeable.
    pub fn code_for(&self, indicator: &str) -> Option<&'static str> {
        let wanted = normalize_key(indicator);
        self.entries
            .iter()
            .find(|(key, _)| normalize_key(key) == wanted)
            .map(|(_, code)| *code)
    }

    /// Resolve `indicator` or fail with an error listing every supported key.
    pub fn lookup(&self, source: DataSource, indicator: &str) -> Result<&'static str> {
        self.code_for(indicator)
            .ok_or_else(|| SourceError::UnsupportedIndicator {
                provider: source,
                indicator: indicator.to_string(),
                supported: self.keys(),
            })
    }

    /// Supported indicator keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|(key, _)| key.to_string()).collect()
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace('_', " ")
}

/// One statistical agency.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Agency identity.
    fn source(&self) -> DataSource;

    /// Indicator keys this agency can answer.
    fn indicators(&self) -> &IndicatorTable;

    /// Resolve the agency-specific code for `indicator`.
    fn indicator_code(&self, indicator: &str) -> Result<&'static str> {
        self.indicators().lookup(self.source(), indicator)
    }

    /// Issue the outbound call and return the raw payload.
    async fn fetch_data(
        &self,
        params: &QueryParams,
        indicator_code: &str,
    ) -> Result<serde_json::Value>;

    /// Map a raw payload onto the unified schema.
    ///
    /// Sets `metadata.unit` to the detected magnitude class of the series.
    fn transform_data(
        &self,
        params: &QueryParams,
        indicator_code: &str,
        raw: serde_json::Value,
    ) -> Result<Dataset>;
}

/// Retry/cache decorator for a [`SourceAdapter`].
///
/// The cache lives as long as this wrapper and is never shared with other
/// sources.
pub struct CachedSource {
    adapter: Arc<dyn SourceAdapter>,
    cache: TtlCache<Dataset>,
    retry: RetryPolicy,
}

impl CachedSource {
    pub fn new(adapter: Arc<dyn SourceAdapter>, config: &SourceConfig) -> Self {
        Self {
            adapter,
            cache: TtlCache::new(config.cache_ttl),
            retry: config.retry,
        }
    }

    pub fn source(&self) -> DataSource {
        self.adapter.source()
    }

    pub fn adapter(&self) -> &dyn SourceAdapter {
        self.adapter.as_ref()
    }

    pub fn cache(&self) -> &TtlCache<Dataset> {
        &self.cache
    }

    /// Fetch and transform with caching and retry.
    ///
    /// Only the fetch is retried; an unsupported indicator fails before any
    /// network call and a transform error propagates immediately.
    pub async fn get_data(&self, params: &QueryParams) -> Result<Dataset> {
        let source = self.adapter.source();
        let code = self.adapter.indicator_code(&params.indicator)?;
        let key = cache_key(source.as_str(), params)?;

        if let Some(dataset) = self.cache.get(&key).await {
            info!(source = %source, "Returning cached data");
            return Ok(dataset);
        }

        let adapter: &dyn SourceAdapter = self.adapter.as_ref();
        let raw = self
            .retry
            .run(
                source.as_str(),
                move |attempt| {
                    debug!(source = %source, attempt, "Fetching");
                    adapter.fetch_data(params, code)
                },
                SourceError::is_transient,
            )
            .await?;

        let dataset = self.adapter.transform_data(params, code, raw)?;
        debug!(
            source = %source,
            points = dataset.data.len(),
            unit = %dataset.metadata.unit,
            "Transformed payload"
        );

        self.cache.insert(key, dataset.clone()).await;
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeFetch, ScriptedAdapter};
    use std::time::Duration;

    fn config() -> SourceConfig {
        SourceConfig::default()
            .with_cache_ttl(Duration::from_secs(3600))
            .with_retry(RetryPolicy::new(3, Duration::from_secs(1)))
    }

    fn params() -> QueryParams {
        QueryParams::new("gdp", "NPL", 2000, 2002)
    }

    #[test]
    fn test_indicator_lookup_is_case_insensitive() {
        let table = IndicatorTable::new(&[("gdp per capita", "NY.GDP.PCAP.CD"), ("gdp", "X")]);
        assert_eq!(table.code_for("GDP Per Capita"), Some("NY.GDP.PCAP.CD"));
        assert_eq!(table.code_for("gdp_per_capita"), Some("NY.GDP.PCAP.CD"));
        assert_eq!(table.keys(), vec!["gdp", "gdp per capita"]);
    }

    #[test]
    fn test_unknown_indicator_lists_keys() {
        let table = IndicatorTable::new(&[("gdp", "X"), ("inflation", "Y")]);
        let err = table
            .lookup(DataSource::WorldBank, "foo_bar_indicator")
            .unwrap_err();
        match err {
            SourceError::UnsupportedIndicator { supported, .. } => {
                assert_eq!(supported, vec!["gdp", "inflation"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_skips_network() {
        let adapter = Arc::new(ScriptedAdapter::with_points(
            DataSource::WorldBank,
            &[(2000, 1.0), (2001, 2.0)],
        ));
        let cached = CachedSource::new(adapter.clone(), &config());

        let first = cached.get_data(&params()).await.unwrap();
        let second = cached.get_data(&params()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(adapter.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_expires_after_ttl() {
        let adapter = Arc::new(ScriptedAdapter::with_points(DataSource::Imf, &[(2000, 1.0)]));
        let cached = CachedSource::new(adapter.clone(), &config());

        cached.get_data(&params()).await.unwrap();
        tokio::time::advance(Duration::from_secs(3601)).await;
        cached.get_data(&params()).await.unwrap();

        assert_eq!(adapter.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_after_two_failures() {
        let adapter = Arc::new(ScriptedAdapter::flaky(DataSource::Oecd, 2, &[(2001, 4.0)]));
        let cached = CachedSource::new(adapter.clone(), &config());
        let started = tokio::time::Instant::now();

        let dataset = cached.get_data(&params()).await.unwrap();

        assert_eq!(dataset.data.len(), 1);
        assert_eq!(adapter.calls(), 3);
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_return_last_upstream_error() {
        let adapter = Arc::new(ScriptedAdapter::failing(DataSource::Un));
        let cached = CachedSource::new(adapter.clone(), &config());

        let err = cached.get_data(&params()).await.unwrap_err();

        assert!(matches!(err, SourceError::Upstream { .. }));
        assert_eq!(adapter.calls(), 3);
        assert!(cached.cache().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_indicator_makes_no_call() {
        let adapter = Arc::new(ScriptedAdapter::with_points(DataSource::WorldBank, &[]));
        let cached = CachedSource::new(adapter.clone(), &config());

        let err = cached
            .get_data(&QueryParams::new("foo_bar_indicator", "NPL", 2000, 2001))
            .await
            .unwrap_err();

        assert!(matches!(err, SourceError::UnsupportedIndicator { .. }));
        assert_eq!(adapter.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transform_error_is_not_retried() {
        let adapter = Arc::new(ScriptedAdapter::scripted(
            DataSource::Imf,
            vec![FakeFetch::Payload(serde_json::json!({"unexpected": true}))],
        ));
        let cached = CachedSource::new(adapter.clone(), &config());

        let err = cached.get_data(&params()).await.unwrap_err();

        assert!(matches!(err, SourceError::MalformedPayload { .. }));
        assert_eq!(adapter.calls(), 1);
    }
}
