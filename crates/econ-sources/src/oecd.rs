//! OECD SDMX-JSON adapter.

use async_trait::async_trait;
use chrono::Utc;

use crate::adapter::{IndicatorTable, SourceAdapter};
use crate::client::{build_http_client, get_json};
use crate::config::SourceConfig;
use crate::schema::{DataPoint, DataSource, Dataset, Metadata, QueryParams};
use crate::sdmx::SdmxMessage;
use crate::units::detect_dataset_unit;
use crate::Result;

const INDICATORS: &[(&str, &str)] = &[
    ("gdp", "SNA/TABLE1/B1_GE"),
    ("gdp_per_capita", "SNA/TABLE3/B1_GE_PC"),
    ("gdp growth", "SNA/TABLE1/B1_GE_GROWTH"),
    ("inflation", "PRICES/CPI/CPALTT01"),
    ("unemployment", "LAB_FORCE/UNE_RATE"),
    ("trade_balance", "MEI/TRD_VALUE"),
    ("government_debt", "GOV_DEBT"),
    ("household_income", "SNA/TABLE14A/B5S14"),
    ("productivity", "PDB_LV/GDP_HC"),
    ("r_and_d", "MSTI/GERD_TOT"),
];

/// Adapter for `stats.oecd.org`.
pub struct OecdAdapter {
    base_url: String,
    client: reqwest::Client,
    indicators: IndicatorTable,
}

impl OecdAdapter {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.endpoints.oecd.trim_end_matches('/').to_string(),
            client: build_http_client(config.http_timeout)?,
            indicators: IndicatorTable::new(INDICATORS),
        })
    }
}

#[async_trait]
impl SourceAdapter for OecdAdapter {
    fn source(&self) -> DataSource {
        DataSource::Oecd
    }

    fn indicators(&self) -> &IndicatorTable {
        &self.indicators
    }

    async fn fetch_data(
        &self,
        params: &QueryParams,
        indicator_code: &str,
    ) -> Result<serde_json::Value> {
        let url = format!("{}/{}/{}/all", self.base_url, indicator_code, params.country);
        let query = [
            ("startTime", params.start_year.to_string()),
            ("endTime", params.end_year.to_string()),
            ("format", "json".to_string()),
        ];
        get_json(&self.client, DataSource::Oecd, &url, &query).await
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
    let source = DataSource::Oecd;
    let message = SdmxMessage::parse(source, raw)?;
    let observations = message.observations(source)?;

    let country_name = message
        .code_name("LOCATION", &params.country)
        .unwrap_or_else(|| params.country.clone());
    let unit_label = message.attribute_name("UNIT").unwrap_or_default();
    let frequency = message
        .dimension_name("FREQUENCY")
        .unwrap_or_else(|| "yearly".to_string());

    let points = observations
        .into_iter()
        .map(|obs| {
            DataPoint::new(Some(obs.value), obs.year, &params.country)
                .with_country_name(&country_name)
                .with_meta("unit_label", unit_label.as_str())
                .with_meta("frequency", frequency.as_str())
                .with_meta("series_key", obs.series_key)
        })
        .collect();

    let mut dataset = Dataset::new(
        Metadata {
            source,
            indicator_code: indicator_code.to_string(),
            indicator_name: message.title().unwrap_or_default(),
            last_updated: Utc::now(),
            frequency,
            unit: String::new(),
        },
        points,
    );
    dataset.metadata.unit = detect_dataset_unit(&dataset).as_str().to_string();
    Ok(dataset)
}
