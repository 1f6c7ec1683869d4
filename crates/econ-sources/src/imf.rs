//! IMF DataMapper API adapter.
//!
//! The DataMapper returns `{"values": {indicator: {country: {year: value}}}}`.
//! IMF does not publish its magnitude into the unit signal; its values get a
//! digit adjustment during normalization instead.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::adapter::{IndicatorTable, SourceAdapter};
use crate::client::{build_http_client, get_json};
use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::schema::{DataPoint, DataSource, Dataset, Metadata, QueryParams};
use crate::units::detect_dataset_unit;
use crate::Result;

const INDICATORS: &[(&str, &str)] = &[
    ("gdp", "NGDP_RPCH"),
    ("gdp growth", "NGDP_RPCH"),
    ("inflation", "PCPIPCH"),
    ("unemployment", "LUR"),
    ("current_account", "BCA"),
    ("government_debt", "GGXWDG_NGDP"),
    ("fiscal_balance", "GGXCNL_NGDP"),
    ("foreign_reserves", "NGDP_FX"),
    ("exports", "BX"),
    ("imports", "BM"),
];

type YearValues = BTreeMap<String, Option<f64>>;

#[derive(Debug, Deserialize)]
struct DataMapperResponse {
    #[serde(default)]
    values: BTreeMap<String, BTreeMap<String, YearValues>>,
}

/// Adapter for the IMF DataMapper.
pub struct ImfAdapter {
    base_url: String,
    client: reqwest::Client,
    indicators: IndicatorTable,
}

impl ImfAdapter {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.endpoints.imf.trim_end_matches('/').to_string(),
            client: build_http_client(config.http_timeout)?,
            indicators: IndicatorTable::new(INDICATORS),
        })
    }
}

#[async_trait]
impl SourceAdapter for ImfAdapter {
    fn source(&self) -> DataSource {
        DataSource::Imf
    }

    fn indicators(&self) -> &IndicatorTable {
        &self.indicators
    }

    async fn fetch_data(
        &self,
        params: &QueryParams,
        indicator_code: &str,
    ) -> Result<serde_json::Value> {
        let url = format!("{}/{}/{}", self.base_url, indicator_code, params.country);
        let periods = (params.start_year..=params.end_year)
            .map(|year| year.to_string())
            .collect::<Vec<_>>()
            .join(",");
        get_json(&self.client, DataSource::Imf, &url, &[("periods", periods)]).await
    }

    fn transform_data(
        &self,
        params: &QueryParams,
        indicator_code: &str,
        raw: serde_json::Value,
    ) -> Result<Dataset> {
        transform(params, indicator_code, raw)
    }
}

fn transform(
    params: &QueryParams,
    indicator_code: &str,
    raw: serde_json::Value,
) -> Result<Dataset> {
    let source = DataSource::Imf;
    let response: DataMapperResponse =
        serde_json::from_value(raw).map_err(|e| SourceError::malformed(source, e.to_string()))?;

    if response.values.is_empty() {
        return Err(SourceError::malformed(source, "no data found in IMF response"));
    }

    let mut points = Vec::new();
    for (code, countries) in &response.values {
        for (country, years) in countries {
            for (year, value) in years {
                let year: i32 = year.trim().parse().map_err(|_| {
                    SourceError::malformed(source, format!("invalid period '{year}'"))
                })?;
                if !params.contains_year(year) {
                    continue;
                }
                points.push(
                    DataPoint::new(*value, year, country).with_meta("indicator_id", code.as_str()),
                );
            }
        }
    }

    let mut dataset = Dataset::new(
        Metadata {
            source,
            indicator_code: indicator_code.to_string(),
            indicator_name: String::new(),
            last_updated: Utc::now(),
            frequency: "yearly".to_string(),
            unit: String::new(),
        },
        points,
    );
    dataset.metadata.unit = detect_dataset_unit(&dataset).as_str().to_string();
    Ok(dataset)
}
