//! World Bank Indicators API (v2) adapter.

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
    ("gdp", "NY.GDP.MKTP.CD"),
    ("gdp per capita", "NY.GDP.PCAP.CD"),
    ("gdp growth", "NY.GDP.MKTP.KD.ZG"),
    ("gni", "NY.GNP.MKTP.CD"),
    ("gni per capita", "NY.GNP.PCAP.CD"),
    ("population", "SP.POP.TOTL"),
    ("population growth", "SP.POP.GROW"),
    ("urban population", "SP.URB.TOTL"),
    ("life expectancy", "SP.DYN.LE00.IN"),
    ("mortality rate", "SP.DYN.IMRT.IN"),
    ("literacy rate", "SE.ADT.LITR.ZS"),
    ("primary enrollment", "SE.PRM.ENRR"),
    ("secondary enrollment", "SE.SEC.ENRR"),
    ("inflation", "FP.CPI.TOTL.ZG"),
    ("unemployment", "SL.UEM.TOTL.ZS"),
    ("exports", "NE.EXP.GNFS.CD"),
    ("imports", "NE.IMP.GNFS.CD"),
    ("fdi", "BX.KLT.DINV.CD.WD"),
];

const PER_PAGE: u32 = 1000;

#[derive(Debug, Default, Deserialize)]
struct Reference {
    #[serde(default)]
    id: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct Observation {
    #[serde(default)]
    indicator: Reference,
    #[serde(default)]
    country: Reference,
    #[serde(default)]
    countryiso3code: String,
    date: String,
    value: Option<f64>,
    #[serde(default)]
    decimal: Option<i64>,
}

/// Adapter for `api.worldbank.org`.
pub struct WorldBankAdapter {
    base_url: String,
    client: reqwest::Client,
    indicators: IndicatorTable,
}

impl WorldBankAdapter {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.endpoints.world_bank.trim_end_matches('/').to_string(),
            client: build_http_client(config.http_timeout)?,
            indicators: IndicatorTable::new(INDICATORS),
        })
    }
}

#[async_trait]
impl SourceAdapter for WorldBankAdapter {
    fn source(&self) -> DataSource {
        DataSource::WorldBank
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
            "{}/country/{}/indicator/{}",
            self.base_url, params.country, indicator_code
        );
        let query = [
            ("format", "json".to_string()),
            ("per_page", PER_PAGE.to_string()),
            ("date", format!("{}:{}", params.start_year, params.end_year)),
        ];
        get_json(&self.client, DataSource::WorldBank, &url, &query).await
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

/// Map a `[page_info, [observations]]` payload onto a dataset.
///
/// The API reports request errors as `[{"message": [...]}]` with status 200.
fn transform(
    params: &QueryParams,
    indicator_code: &str,
    raw: serde_json::Value,
) -> Result<Dataset> {
    let source = DataSource::WorldBank;
    let parts = raw
        .as_array()
        .ok_or_else(|| SourceError::malformed(source, "expected a JSON array"))?;

    if let Some(message) = parts.first().and_then(|head| head.get("message")) {
        return Err(SourceError::malformed(source, message.to_string()));
    }
    let rows = match parts.get(1) {
        Some(serde_json::Value::Array(rows)) if !rows.is_empty() => rows,
        _ => {
            return Err(SourceError::malformed(
                source,
                "no data points found in the response",
            ))
        }
    };

    let observations: Vec<Observation> =
        serde_json::from_value(serde_json::Value::Array(rows.clone()))
            .map_err(|e| SourceError::malformed(source, e.to_string()))?;

    let (code, name) = observations
        .first()
        .map(|o| (o.indicator.id.clone(), o.indicator.value.clone()))
        .unwrap_or_default();

    let mut points = Vec::with_capacity(observations.len());
    for obs in observations {
        let Some(value) = obs.value else {
            continue;
        };
        let year: i32 = obs.date.trim().parse().map_err(|_| {
            SourceError::malformed(source, format!("invalid observation date '{}'", obs.date))
        })?;
        let country_code = if obs.countryiso3code.is_empty() {
            params.country.as_str()
        } else {
            obs.countryiso3code.as_str()
        };
        points.push(
            DataPoint::new(Some(value), year, country_code)
                .with_country_name(&obs.country.value)
                .with_meta("decimal", obs.decimal.unwrap_or(0))
                .with_meta("indicator_id", obs.indicator.id.clone())
                .with_meta("indicator_name", obs.indicator.value.clone()),
        );
    }

    let mut dataset = Dataset::new(
        Metadata {
            source,
            indicator_code: if code.is_empty() {
                indicator_code.to_string()
            } else {
                code
            },
            indicator_name: name,
            last_updated: Utc::now(),
            frequency: "yearly".to_string(),
            unit: String::new(),
        },
        points,
    );
    dataset.metadata.unit = detect_dataset_unit(&dataset).as_str().to_string();
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params() -> QueryParams {
        QueryParams::new("gdp", "NPL", 2018, 2020)
    }

    fn payload() -> serde_json::Value {
        json!([
            {"page": 1, "pages": 1, "per_page": 1000, "total": 3},
            [
                {
                    "indicator": {"id": "NY.GDP.MKTP.CD", "value": "GDP (current US$)"},
                    "country": {"id": "NP", "value": "Nepal"},
                    "countryiso3code": "NPL",
                    "date": "2020",
                    "value": 33_433_664_350.0,
                    "unit": "",
                    "obs_status": "",
                    "decimal": 0
                },
                {
                    "indicator": {"id": "NY.GDP.MKTP.CD", "value": "GDP (current US$)"},
                    "country": {"id": "NP", "value": "Nepal"},
                    "countryiso3code": "NPL",
                    "date": "2019",
                    "value": null,
                    "decimal": 0
                },
                {
                    "indicator": {"id": "NY.GDP.MKTP.CD", "value": "GDP (current US$)"},
                    "country": {"id": "NP", "value": "Nepal"},
                    "countryiso3code": "NPL",
                    "date": "2018",
                    "value": 33_111_525_465.0,
                    "decimal": 0
                }
            ]
        ])
    }

    #[test]
    fn test_transform_sorts_and_drops_nulls() {
        let ds = transform(&params(), "NY.GDP.MKTP.CD", payload()).unwrap();
        let years: Vec<i32> = ds.data.iter().map(|p| p.year).collect();
        assert_eq!(years, vec![2018, 2020]);
        assert_eq!(ds.data[0].country_name, "Nepal");
        assert_eq!(ds.data[0].country_code, "NPL");
        assert_eq!(ds.metadata.indicator_name, "GDP (current US$)");
        assert_eq!(ds.metadata.source, DataSource::WorldBank);
    }

    #[test]
    fn test_transform_detects_unit_from_first_value() {
        let ds = transform(&params(), "NY.GDP.MKTP.CD", payload()).unwrap();
        assert_eq!(ds.metadata.unit, "billions");
    }

    #[test]
    fn test_error_message_payload_is_rejected() {
        let raw = json!([{"message": [{"id": "120", "key": "Invalid value", "value": "bad country"}]}]);
        let err = transform(&params(), "NY.GDP.MKTP.CD", raw).unwrap_err();
        assert!(err.to_string().contains("Invalid value"));
    }

    #[test]
    fn test_empty_page_is_rejected() {
        let raw = json!([{"page": 0, "pages": 0, "total": 0}, null]);
        assert!(matches!(
            transform(&params(), "NY.GDP.MKTP.CD", raw),
            Err(SourceError::MalformedPayload { .. })
        ));
    }

    #[test]
    fn test_unsupported_indicator_lists_world_bank_keys() {
        let adapter = WorldBankAdapter::new(&SourceConfig::default()).unwrap();
        let err = adapter.indicator_code("foo_bar_indicator").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("gdp per capita"));
        assert!(msg.contains("unemployment"));
        assert_eq!(adapter.indicator_code("GDP").unwrap(), "NY.GDP.MKTP.CD");
    }
}
