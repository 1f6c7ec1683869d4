//! Concurrent fan-out over every source, then normalize, merge and analyze.
//!
//! [`Orchestrator`] spawns one task per source onto a [`JoinSet`] and collects
//! results in completion order until every task finished or the request
//! deadline elapsed. Only after that barrier does it read the request's unit
//! signal, so normalization never sees a half-published signal.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use econ_sources::units::normalize_datasets;
use econ_sources::{
    default_adapters, CachedSource, DataSource, Dataset, Magnitude, QueryParams, SourceAdapter,
    SourceError,
};
use serde_json::json;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

use crate::analysis::Analyzer;
use crate::config::{PipelineConfig, PipelineMode};
use crate::context::RequestContext;
use crate::error::{AnalysisError, PipelineError, PipelineResult};
use crate::reconcile::merge_datasets;
use crate::response::AggregatedResponse;

/// Runs all configured sources for one query and assembles the response.
pub struct Orchestrator {
    sources: BTreeMap<DataSource, Arc<CachedSource>>,
    config: PipelineConfig,
    analyzer: Option<Arc<dyn Analyzer>>,
}

impl Orchestrator {
    /// Wrap each adapter in its own [`CachedSource`]. A later adapter for the
    /// same source replaces an earlier one.
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, config: PipelineConfig) -> Self {
        let sources = adapters
            .into_iter()
            .map(|adapter| {
                let source = adapter.source();
                (source, Arc::new(CachedSource::new(adapter, &config.sources)))
            })
            .collect();
        Self {
            sources,
            config,
            analyzer: None,
        }
    }

    /// Orchestrator over the four live agency adapters.
    pub fn from_config(config: PipelineConfig) -> PipelineResult<Self> {
        let adapters = default_adapters(&config.sources)?;
        Ok(Self::new(adapters, config))
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn source(&self, source: DataSource) -> Option<&CachedSource> {
        self.sources.get(&source).map(Arc::as_ref)
    }

    /// Supported indicator keys per source id.
    pub fn available_indicators(&self) -> BTreeMap<String, Vec<String>> {
        self.sources
            .iter()
            .map(|(source, cached)| {
                (
                    source.as_str().to_string(),
                    cached.adapter().indicators().keys(),
                )
            })
            .collect()
    }

    /// Run one fan-out for `params`.
    ///
    /// Per-source failures end up in `error_summary`; the call only fails when
    /// the query is invalid or no source produced a dataset.
    pub async fn fetch_all_data(&self, params: QueryParams) -> PipelineResult<AggregatedResponse> {
        let params = params
            .validate()
            .map_err(|e| PipelineError::InvalidQuery(e.to_string()))?;
        let ctx = Arc::new(RequestContext::new(params));
        info!(
            request_id = %ctx.request_id,
            indicator = %ctx.params.indicator,
            country = %ctx.params.country,
            start_year = ctx.params.start_year,
            end_year = ctx.params.end_year,
            sources = self.sources.len(),
            "Starting fan-out"
        );

        let (mut datasets, errors) = self.collect(&ctx).await;

        if datasets.is_empty() {
            error!(request_id = %ctx.request_id, failed = errors.len(), "All sources failed");
            return Err(PipelineError::AllSourcesFailed { errors });
        }

        // Every task has finished here, so the signal is final.
        let signal = ctx.unit_signal().await;
        let target = normalize_datasets(&mut datasets, &signal);
        datasets.sort_by_key(|d| d.source());
        debug!(request_id = %ctx.request_id, target = %target, "Normalized");

        let output = match self.config.mode {
            PipelineMode::Merged => vec![merge_datasets(&datasets, self.config.merge_policy)?],
            PipelineMode::PerSource => datasets,
        };

        let mut response = AggregatedResponse::new(ctx.params.clone(), output, errors);
        response.analyses = self.analyze(&ctx, &response.datasets).await;

        info!(
            request_id = %ctx.request_id,
            status = ?response.status,
            failed = response.failed_count(),
            elapsed_ms = (Utc::now() - ctx.started_at).num_milliseconds(),
            "Fan-out complete"
        );
        Ok(response)
    }

    /// [`fetch_all_data`](Self::fetch_all_data), repeated with exponential
    /// backoff while every source fails. The last error is returned.
    pub async fn fetch_with_retry(
        &self,
        params: QueryParams,
    ) -> PipelineResult<AggregatedResponse> {
        let policy = self.config.outer_retry;
        let result = policy
            .run(
                "fan_out",
                |attempt| {
                    debug!(attempt, "Fan-out attempt");
                    self.fetch_all_data(params.clone())
                },
                PipelineError::is_retryable,
            )
            .await;

        if let Err(err) = &result {
            error!(attempts = policy.max_attempts, error = %err, "Fan-out failed");
        }
        result
    }

    async fn collect(
        &self,
        ctx: &Arc<RequestContext>,
    ) -> (Vec<Dataset>, BTreeMap<String, Vec<String>>) {
        let mut join_set = JoinSet::new();
        for (&source, cached) in &self.sources {
            let cached = Arc::clone(cached);
            let ctx = Arc::clone(ctx);
            join_set.spawn(async move {
                let result = cached.get_data(&ctx.params).await;
                if let Ok(dataset) = &result {
                    ctx.publish_unit(source, Magnitude::from_label(&dataset.metadata.unit))
                        .await;
                }
                (source, result)
            });
        }

        let deadline = Instant::now() + self.config.request_timeout;
        let mut pending: BTreeSet<DataSource> = self.sources.keys().copied().collect();
        let mut datasets = Vec::new();
        let mut errors = BTreeMap::new();
        let mut timed_out = false;

        loop {
            match timeout_at(deadline, join_set.join_next()).await {
                Ok(Some(Ok((source, result)))) => {
                    pending.remove(&source);
                    match result {
                        Ok(dataset) => {
                            debug!(
                                request_id = %ctx.request_id,
                                source = %source,
                                points = dataset.data.len(),
                                "Source answered"
                            );
                            datasets.push(dataset);
                        }
                        Err(err) => {
                            warn!(
                                request_id = %ctx.request_id,
                                source = %source,
                                error = %err,
                                "Source failed"
                            );
                            errors.insert(source.as_str().to_string(), vec![err.to_string()]);
                        }
                    }
                }
                Ok(Some(Err(join_err))) => {
                    error!(
                        request_id = %ctx.request_id,
                        error = %join_err,
                        "Source task join error"
                    );
                }
                Ok(None) => break,
                Err(_) => {
                    timed_out = true;
                    join_set.abort_all();
                    break;
                }
            }
        }

        for source in pending {
            let message = if timed_out {
                SourceError::DeadlineExceeded { provider: source }.to_string()
            } else {
                format!("{source} task terminated unexpectedly")
            };
            warn!(request_id = %ctx.request_id, source = %source, "{message}");
            errors.insert(source.as_str().to_string(), vec![message]);
        }

        (datasets, errors)
    }

    /// Attach analyses; any failure is recorded under `"error"`.
    async fn analyze(
        &self,
        ctx: &RequestContext,
        datasets: &[Dataset],
    ) -> Option<BTreeMap<String, String>> {
        let analyzer = self.analyzer.as_ref()?;
        if datasets.is_empty() {
            return None;
        }

        let mut analyses = BTreeMap::new();
        if let Err(err) = self
            .run_analyses(analyzer.as_ref(), ctx, datasets, &mut analyses)
            .await
        {
            warn!(request_id = %ctx.request_id, error = %err, "Analysis failed");
            analyses.insert("error".to_string(), format!("Analysis failed: {err}"));
        }
        Some(analyses)
    }

    async fn run_analyses(
        &self,
        analyzer: &dyn Analyzer,
        ctx: &RequestContext,
        datasets: &[Dataset],
        analyses: &mut BTreeMap<String, String>,
    ) -> Result<(), AnalysisError> {
        let country = ctx.params.country.as_str();
        let indicator = ctx.params.indicator.as_str();

        match self.config.mode {
            PipelineMode::Merged => {
                for dataset in datasets {
                    let data = serde_json::to_value(dataset)?;
                    let text = analyzer.analyze(country, indicator, &data).await?;
                    analyses.insert("merged".to_string(), text);
                }
            }
            PipelineMode::PerSource => {
                let combined = json!({
                    "datasets": datasets,
                    "sources": datasets.iter().map(|d| d.source().as_str()).collect::<Vec<_>>(),
                });
                let text = analyzer.analyze(country, indicator, &combined).await?;
                analyses.insert("combined".to_string(), text);

                for dataset in datasets {
                    let data = serde_json::to_value(dataset)?;
                    let text = analyzer.analyze(country, indicator, &data).await?;
                    analyses.insert(dataset.source().as_str().to_string(), text);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use econ_sources::fakes::ScriptedAdapter;
    use econ_sources::RetryPolicy;
    use std::time::Duration;

    fn config() -> PipelineConfig {
        PipelineConfig::default()
            .with_request_timeout(Duration::from_secs(30))
            .with_outer_retry(RetryPolicy::new(3, Duration::from_secs(1)))
            .with_mode(PipelineMode::Merged)
            .with_sources(
                econ_sources::SourceConfig::default()
                    .with_retry(RetryPolicy::new(3, Duration::from_secs(1))),
            )
    }

    #[test]
    fn test_available_indicators_per_source() {
        let adapters: Vec<Arc<dyn SourceAdapter>> = DataSource::ALL
            .iter()
            .map(|&s| Arc::new(ScriptedAdapter::with_points(s, &[])) as Arc<dyn SourceAdapter>)
            .collect();
        let orchestrator = Orchestrator::new(adapters, config());
        let indicators = orchestrator.available_indicators();
        assert_eq!(
            indicators.keys().cloned().collect::<Vec<_>>(),
            vec!["imf", "oecd", "un", "world_bank"]
        );
        assert!(indicators["world_bank"].contains(&"gdp".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_query_is_rejected_before_fan_out() {
        let wb = Arc::new(ScriptedAdapter::with_points(DataSource::WorldBank, &[(2000, 1.0)]));
        let orchestrator = Orchestrator::new(vec![wb.clone() as Arc<dyn SourceAdapter>], config());
        let err = orchestrator
            .fetch_all_data(QueryParams::new("gdp", "Nepal", 2000, 2001))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidQuery(_)));
        assert_eq!(wb.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_marks_slow_source_failed() {
        let wb: Arc<dyn SourceAdapter> =
            Arc::new(ScriptedAdapter::with_points(DataSource::WorldBank, &[(2000, 1.0)]));
        let imf: Arc<dyn SourceAdapter> = Arc::new(ScriptedAdapter::slow(
            DataSource::Imf,
            Duration::from_secs(120),
            &[(2000, 2.0)],
        ));
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![wb, imf];
        let orchestrator = Orchestrator::new(
            adapters,
            config().with_request_timeout(Duration::from_secs(5)),
        );
        let response = orchestrator
            .fetch_all_data(QueryParams::new("gdp", "NPL", 2000, 2001))
            .await
            .unwrap();
        let summary = response.error_summary.unwrap();
        assert!(summary["imf"][0].contains("request deadline exceeded"));
        assert!(!summary.contains_key("world_bank"));
    }
}
