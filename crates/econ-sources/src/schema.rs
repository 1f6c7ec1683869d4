//! Unified data model shared by every source adapter.
//!
//! - `QueryParams`: the structured request (indicator, country, year range)
//! - `DataPoint` / `Dataset`: one source's observations mapped onto a single shape
//! - `DataSource`: identity of the statistical agency that produced a dataset

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::Result;

/// Statistical agency a dataset originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    WorldBank,
    Imf,
    Oecd,
    Un,
}

impl DataSource {
    /// Every supported source, in merge-priority order.
    pub const ALL: [DataSource; 4] = [
        DataSource::WorldBank,
        DataSource::Imf,
        DataSource::Oecd,
        DataSource::Un,
    ];

    /// Stable identifier used as map key in responses (`"world_bank"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::WorldBank => "world_bank",
            DataSource::Imf => "imf",
            DataSource::Oecd => "oecd",
            DataSource::Un => "un",
        }
    }

    /// Whether this source publishes its detected magnitude into the
    /// per-request unit signal.
    pub fn publishes_unit(&self) -> bool {
        matches!(self, DataSource::WorldBank | DataSource::Un)
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataSource::WorldBank => "World Bank",
            DataSource::Imf => "IMF",
            DataSource::Oecd => "OECD",
            DataSource::Un => "UN",
        };
        write!(f, "{}", name)
    }
}

/// Structured request handed to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryParams {
    /// Indicator key, e.g. `"gdp"` (looked up case-insensitively per source)
    pub indicator: String,
    /// ISO-3166 alpha-3 country code
    pub country: String,
    /// First year of the range (inclusive)
    pub start_year: i32,
    /// Last year of the range (inclusive)
    pub end_year: i32,
}

impl QueryParams {
    pub fn new(indicator: &str, country: &str, start_year: i32, end_year: i32) -> Self {
        QueryParams {
            indicator: indicator.to_string(),
            country: country.to_string(),
            start_year,
            end_year,
        }
    }

    /// Validate and normalize the request in place.
    ///
    /// Indicator keys are trimmed and lowercased, country codes upper-cased.
    pub fn validate(mut self) -> Result<Self> {
        self.indicator = self.indicator.trim().to_lowercase();
        self.country = self.country.trim().to_ascii_uppercase();

        if self.indicator.is_empty() {
            return Err(SourceError::InvalidRequest(
                "indicator must not be empty".to_string(),
            ));
        }
        if self.country.len() != 3 || !self.country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(SourceError::InvalidRequest(format!(
                "country '{}' is not an ISO-3166 alpha-3 code",
                self.country
            )));
        }
        if self.start_year > self.end_year {
            return Err(SourceError::InvalidRequest(format!(
                "start_year {} is after end_year {}",
                self.start_year, self.end_year
            )));
        }
        Ok(self)
    }

    /// Whether `year` falls inside the requested range.
    pub fn contains_year(&self, year: i32) -> bool {
        (self.start_year..=self.end_year).contains(&year)
    }
}

/// Descriptive metadata attached to a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub source: DataSource,
    pub indicator_code: String,
    pub indicator_name: String,
    pub last_updated: DateTime<Utc>,
    pub frequency: String,
    /// Magnitude label (`"millions"`, ...) or a free-text unit from the source
    pub unit: String,
}

/// A single yearly observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// `None` means the source reported the year without a value
    pub value: Option<f64>,
    pub year: i32,
    pub country_code: String,
    #[serde(default)]
    pub country_name: String,
    /// Opaque passthrough fields; only the `unit` key is ever interpreted
    #[serde(default)]
    pub source_metadata: serde_json::Map<String, serde_json::Value>,
}

impl DataPoint {
    pub fn new(value: Option<f64>, year: i32, country_code: &str) -> Self {
        DataPoint {
            value,
            year,
            country_code: country_code.to_string(),
            country_name: String::new(),
            source_metadata: serde_json::Map::new(),
        }
    }

    pub fn with_country_name(mut self, name: &str) -> Self {
        self.country_name = name.to_string();
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.source_metadata.insert(key.to_string(), value.into());
        self
    }

    /// Per-point unit hint, if one was recorded.
    pub fn unit_hint(&self) -> Option<&str> {
        self.source_metadata.get("unit").and_then(|v| v.as_str())
    }
}

/// One source's full answer for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub metadata: Metadata,
    /// Ascending by year; missing years are absent, not null-filled
    pub data: Vec<DataPoint>,
}

impl Dataset {
    /// Build a dataset, sorting points by year and keeping the first point
    /// seen for any duplicated year.
    pub fn new(metadata: Metadata, mut data: Vec<DataPoint>) -> Self {
        data.sort_by_key(|p| p.year);
        data.dedup_by_key(|p| p.year);
        Dataset { metadata, data }
    }

    pub fn source(&self) -> DataSource {
        self.metadata.source
    }

    pub fn point_for_year(&self, year: i32) -> Option<&DataPoint> {
        self.data
            .binary_search_by_key(&year, |p| p.year)
            .ok()
            .map(|idx| &self.data[idx])
    }

    /// First non-null value in year order.
    pub fn first_value(&self) -> Option<f64> {
        self.data.iter().find_map(|p| p.value)
    }

    /// Parallel year/value vectors for charting front ends.
    pub fn series(&self) -> ChartSeries {
        ChartSeries {
            years: self.data.iter().map(|p| p.year).collect(),
            values: self.data.iter().map(|p| p.value).collect(),
        }
    }
}

/// Year/value columns extracted from a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub years: Vec<i32>,
    pub values: Vec<Option<f64>>,
}
