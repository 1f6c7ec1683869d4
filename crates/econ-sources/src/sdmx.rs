//! Minimal SDMX-JSON reader shared by the OECD and UN adapters.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::SourceError;
use crate::schema::DataSource;
use crate::Result;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SdmxMessage {
    #[serde(rename = "dataSets", default)]
    data_sets: Vec<SdmxDataSet>,
    #[serde(default)]
    structure: SdmxStructure,
}

#[derive(Debug, Default, Deserialize)]
struct SdmxDataSet {
    #[serde(default)]
    series: BTreeMap<String, SdmxSeries>,
}

#[derive(Debug, Default, Deserialize)]
struct SdmxSeries {
    #[serde(default)]
    observations: BTreeMap<String, Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct SdmxStructure {
    #[serde(default)]
    name: Value,
    #[serde(default)]
    dimensions: SdmxComponents,
    #[serde(default)]
    attributes: SdmxComponents,
}

#[derive(Debug, Default, Deserialize)]
struct SdmxComponents {
    #[serde(default)]
    series: Vec<SdmxComponent>,
    #[serde(default)]
    observation: Vec<SdmxComponent>,
}

#[derive(Debug, Default, Deserialize)]
struct SdmxComponent {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: Value,
    #[serde(default)]
    values: Vec<SdmxCode>,
}

#[derive(Debug, Default, Deserialize)]
struct SdmxCode {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: Value,
}

/// One observation pulled out of a series: `(series key, year, value)`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SdmxObservation {
    pub series_key: String,
    pub year: i32,
    pub value: f64,
}

/// Names may be plain strings or localized maps (`{"en": "..."}`).
fn label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => map
            .get("en")
            .or_else(|| map.values().next())
            .and_then(|v| v.as_str())
            .map(str::to_string),
        _ => None,
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl SdmxMessage {
    pub fn parse(source: DataSource, raw: Value) -> Result<Self> {
        serde_json::from_value(raw).map_err(|e| SourceError::malformed(source, e.to_string()))
    }

    /// Non-null observations of every series in the first data set.
    ///
    /// The observation key indexes into the `TIME_PERIOD` dimension; the value
    /// sits in the first position of the observation array.
    pub fn observations(&self, source: DataSource) -> Result<Vec<SdmxObservation>> {
        let series = self
            .data_sets
            .first()
            .map(|ds| &ds.series)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SourceError::malformed(source, "no data found in SDMX response"))?;

        let periods = self
            .structure
            .dimensions
            .observation
            .iter()
            .find(|d| d.id == "TIME_PERIOD")
            .map(|d| d.values.as_slice())
            .unwrap_or_default();

        let mut out = Vec::new();
        for (series_key, data) in series {
            for (time_idx, obs) in &data.observations {
                let Some(value) = obs.first().and_then(numeric) else {
                    continue;
                };
                let period = time_idx
                    .parse::<usize>()
                    .ok()
                    .and_then(|idx| periods.get(idx))
                    .ok_or_else(|| {
                        SourceError::malformed(source, format!("unknown time index '{time_idx}'"))
                    })?;
                let year = period.id.get(..4).and_then(|y| y.parse().ok()).ok_or_else(|| {
                    SourceError::malformed(source, format!("invalid time period '{}'", period.id))
                })?;
                out.push(SdmxObservation {
                    series_key: series_key.clone(),
                    year,
                    value,
                });
            }
        }
        Ok(out)
    }

    /// Name of the structure (dataflow title).
    pub fn title(&self) -> Option<String> {
        label(&self.structure.name)
    }

    /// Name of a series-level dimension, e.g. `FREQUENCY`.
    pub fn dimension_name(&self, id: &str) -> Option<String> {
        self.structure
            .dimensions
            .series
            .iter()
            .find(|d| d.id == id)
            .and_then(|d| label(&d.name))
    }

    /// Display name of `code` within the series-level dimension `id`.
    pub fn code_name(&self, id: &str, code: &str) -> Option<String> {
        self.structure
            .dimensions
            .series
            .iter()
            .find(|d| d.id == id)
            .and_then(|d| d.values.iter().find(|v| v.id == code))
            .and_then(|v| label(&v.name))
    }

    /// Name of a series- or observation-level attribute, e.g. `UNIT`.
    pub fn attribute_name(&self, id: &str) -> Option<String> {
        let attributes = &self.structure.attributes;
        attributes
            .series
            .iter()
            .chain(attributes.observation.iter())
            .find(|a| a.id == id)
            .and_then(|a| label(&a.name))
    }
}
