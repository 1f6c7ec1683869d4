//! Strict parsing of structured queries produced by an upstream extractor.

use econ_sources::QueryParams;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

pub const DEFAULT_START_YEAR: i32 = 2000;
pub const DEFAULT_END_YEAR: i32 = 2023;

/// Untrusted JSON query. Unknown fields are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryPayload {
    pub indicator: String,
    pub country: String,
    #[serde(default = "default_start_year")]
    pub start_year: i32,
    #[serde(default = "default_end_year")]
    pub end_year: i32,
}

fn default_start_year() -> i32 {
    DEFAULT_START_YEAR
}

fn default_end_year() -> i32 {
    DEFAULT_END_YEAR
}

impl QueryPayload {
    /// Parse and validate `json` into [`QueryParams`].
    pub fn parse(json: &str) -> PipelineResult<QueryParams> {
        let payload: QueryPayload = serde_json::from_str(json)
            .map_err(|e| PipelineError::InvalidQuery(e.to_string()))?;
        payload.into_params()
    }

    pub fn into_params(self) -> PipelineResult<QueryParams> {
        QueryParams::new(&self.indicator, &self.country, self.start_year, self.end_year)
            .validate()
            .map_err(|e| PipelineError::InvalidQuery(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_applies_defaults() {
        let params = QueryPayload::parse(r#"{"indicator": "GDP", "country": "npl"}"#).unwrap();
        assert_eq!(params, QueryParams::new("gdp", "NPL", 2000, 2023));
    }

    #[test]
    fn test_parse_rejects_unknown_fields() {
        let err = QueryPayload::parse(
            r#"{"indicator": "gdp", "country": "NPL", "exec": "rm -rf /"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidQuery(_)));
    }

    #[test]
    fn test_parse_rejects_bad_country() {
        let err = QueryPayload::parse(r#"{"indicator": "gdp", "country": "Nepal"}"#).unwrap_err();
        assert!(err.to_string().contains("alpha-3"));
    }

    #[test]
    fn test_parse_rejects_inverted_years() {
        let json = r#"{"indicator": "gdp", "country": "NPL", "start_year": 2020, "end_year": 2010}"#;
        assert!(QueryPayload::parse(json).is_err());
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(QueryPayload::parse("gdp of nepal").is_err());
    }
}
