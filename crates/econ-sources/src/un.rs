//! UNdata SDMX REST adapter.

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
    ("population", "SP_POP_TOTL"),
    ("life_expectancy", "SP_DYN_LE00_IN"),
    ("education_index", "EDU_IDX"),
    ("gender_inequality", "GII"),
    ("human_development", "HDI"),
    ("maternal_mortality", "SH_MMR"),
    ("child_mortality", "SH_DYN_MORT"),
    ("access_electricity", "EG_ELC_ACCS_ZS"),
    ("internet_users", "IT_NET_USER_ZS"),
    ("gdp growth", "NY_GDP_MKTP_KD_ZG_UN"),
    ("gdp", "NY_GDP_MKTP_CD"),
];

const DATAFLOW: &str = "DF_UNData_WDI";

/// Adapter for `data.un.org`.
pub struct UnAdapter {
    base_url: String,
    client: reqwest::Client,
    indicators: IndicatorTable,
}

impl UnAdapter {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.endpoints.un.trim_end_matches('/').to_string(),
            client: build_http_client(config.http_timeout)?,
            indicators: IndicatorTable::new(INDICATORS),
        })
    }
}

#[async_trait]
impl SourceAdapter for UnAdapter {
    fn source(&self) -> DataSource {
        DataSource::Un
    }

    fn indicators(&self) -> &IndicatorTable {
        &self.indicators
    }

    async fn fetch_data(
        &self,
        params: &QueryParams,
        indicator_code: &str,
    ) -> Result<serde_json::Value> {
        let url = format!(
            "{}/{}/A.{}.{}",
            self.base_url, DATAFLOW, indicator_code, params.country
        );
        let query = [
            ("startPeriod", params.start_year.to_string()),
            ("endPeriod", params.end_year.to_string()),
        ];
        get_json(&self.client, DataSource::Un, &url, &query).await
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
    let source = DataSource::Un;
    let message = SdmxMessage::parse(source, raw)?;
    let observations = message.observations(source)?;

    let country_name = message
        .code_name("REF_AREA", &params.country)
        .unwrap_or_default();
    let indicator_name = message
        .code_name("SERIES", indicator_code)
        .or_else(|| message.dimension_name("SERIES"))
        .unwrap_or_default();
    let unit_label = message.attribute_name("UNIT_MEASURE").unwrap_or_default();

    let points = observations
        .into_iter()
        .map(|obs| {
            DataPoint::new(Some(obs.value), obs.year, &params.country)
                .with_country_name(&country_name)
                .with_meta("indicator_id", indicator_code)
                .with_meta("unit_label", unit_label.as_str())
        })
        .collect();

    let mut dataset = Dataset::new(
        Metadata {
            source,
            indicator_code: indicator_code.to_string(),
            indicator_name,
            last_updated: Utc::now(),
            frequency: message
                .dimension_name("FREQ")
                .unwrap_or_else(|| "yearly".to_string()),
            unit: String::new(),
        },
        points,
    );
    dataset.metadata.unit = detect_dataset_unit(&dataset).as_str().to_string();
    Ok(dataset)
}
