//! In-memory fakes for the adapter trait (testing only)
//!
//! `ScriptedAdapter` answers `fetch_data` from a script of canned outcomes and
//! counts calls, so retry, cache and orchestration logic can be exercised
//! without network access.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::adapter::{IndicatorTable, SourceAdapter};
use crate::error::SourceError;
use crate::schema::{DataPoint, DataSource, Dataset, Metadata, QueryParams};
use crate::units::detect_dataset_unit;
use crate::Result;

/// One scripted outcome of `fetch_data`.
#[derive(Debug, Clone)]
pub enum FakeFetch {
    /// Return this payload
    Payload(serde_json::Value),
    /// Fail as if the agency answered with `status`
    Fail { status: u16, body: String },
    /// Sleep, then behave like the inner outcome
    Stall(Duration, Box<FakeFetch>),
}

impl FakeFetch {
    /// Payload in the shape `ScriptedAdapter::transform_data` understands.
    pub fn points(points: &[(i32, f64)]) -> Self {
        let points: Vec<_> = points
            .iter()
            .map(|(year, value)| json!({"year": year, "value": value}))
            .collect();
        FakeFetch::Payload(json!({ "points": points }))
    }

    pub fn unavailable() -> Self {
        FakeFetch::Fail {
            status: 503,
            body: "service unavailable".to_string(),
        }
    }
}

#[derive(Deserialize)]
struct FakePayload {
    points: Vec<FakePoint>,
}

#[derive(Deserialize)]
struct FakePoint {
    year: i32,
    value: Option<f64>,
}

/// Adapter that replays a script, then repeats a fallback outcome forever.
#[derive(Debug)]
pub struct ScriptedAdapter {
    source: DataSource,
    indicators: IndicatorTable,
    script: Mutex<VecDeque<FakeFetch>>,
    fallback: FakeFetch,
    calls: AtomicUsize,
}

impl ScriptedAdapter {
    /// Replay `script` in order; once exhausted keep failing with 503.
    pub fn scripted(source: DataSource, script: Vec<FakeFetch>) -> Self {
        Self::with_fallback(source, script, FakeFetch::unavailable())
    }

    pub fn with_fallback(source: DataSource, script: Vec<FakeFetch>, fallback: FakeFetch) -> Self {
        Self {
            source,
            indicators: IndicatorTable::new(&[
                ("gdp", "FAKE.GDP"),
                ("inflation", "FAKE.CPI"),
                ("population", "FAKE.POP"),
            ]),
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always succeed with `points`.
    pub fn with_points(source: DataSource, points: &[(i32, f64)]) -> Self {
        Self::with_fallback(source, Vec::new(), FakeFetch::points(points))
    }

    /// Always fail with an upstream 503.
    pub fn failing(source: DataSource) -> Self {
        Self::scripted(source, Vec::new())
    }

    /// Fail `failures` times, then succeed with `points`.
    pub fn flaky(source: DataSource, failures: usize, points: &[(i32, f64)]) -> Self {
        let script = vec![FakeFetch::unavailable(); failures];
        Self::with_fallback(source, script, FakeFetch::points(points))
    }

    /// Succeed with `points` after sleeping `delay` on every call.
    pub fn slow(source: DataSource, delay: Duration, points: &[(i32, f64)]) -> Self {
        let outcome = FakeFetch::Stall(delay, Box::new(FakeFetch::points(points)));
        Self::with_fallback(source, Vec::new(), outcome)
    }

    /// Replace the default `gdp`/`inflation`/`population` table.
    pub fn with_indicators(mut self, entries: &[(&'static str, &'static str)]) -> Self {
        self.indicators = IndicatorTable::new(entries);
        self
    }

    /// Number of `fetch_data` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> FakeFetch {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        script.pop_front().unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn source(&self) -> DataSource {
        self.source
    }

    fn indicators(&self) -> &IndicatorTable {
        &self.indicators
    }

    async fn fetch_data(
        &self,
        _params: &QueryParams,
        _indicator_code: &str,
    ) -> Result<serde_json::Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut outcome = self.next_outcome();
        loop {
            match outcome {
                FakeFetch::Payload(value) => return Ok(value),
                FakeFetch::Fail { status, body } => {
                    return Err(SourceError::Upstream {
                        provider: self.source,
                        status,
                        body,
                    })
                }
                FakeFetch::Stall(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    outcome = *inner;
                }
            }
        }
    }

    fn transform_data(
        &self,
        params: &QueryParams,
        indicator_code: &str,
        raw: serde_json::Value,
    ) -> Result<Dataset> {
        let payload: FakePayload = serde_json::from_value(raw)
            .map_err(|e| SourceError::malformed(self.source, e.to_string()))?;

        let points = payload
            .points
            .into_iter()
            .map(|p| DataPoint::new(p.value, p.year, &params.country))
            .collect();

        let mut dataset = Dataset::new(
            Metadata {
                source: self.source,
                indicator_code: indicator_code.to_string(),
                indicator_name: params.indicator.clone(),
                last_updated: Utc::now(),
                frequency: "yearly".to_string(),
                unit: String::new(),
            },
            points,
        );
        dataset.metadata.unit = detect_dataset_unit(&dataset).as_str().to_string();
        Ok(dataset)
    }
}
