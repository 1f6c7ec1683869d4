//! Final pipeline output handed to presentation layers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use econ_sources::{Dataset, QueryParams};
use serde::{Deserialize, Serialize};

/// Outcome of a fan-out. Total failure is an error, never a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// Every source answered
    Completed,
    /// At least one source failed and at least one succeeded
    PartialSuccess,
}

/// Aggregated answer for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedResponse {
    pub query_params: QueryParams,
    pub timestamp: DateTime<Utc>,
    /// The merged dataset, or the normalized per-source list
    pub datasets: Vec<Dataset>,
    pub status: ResponseStatus,
    /// Source id → error messages; present only when a source failed
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_summary: Option<BTreeMap<String, Vec<String>>>,
    /// Label (`"merged"`, `"combined"`, source id, `"error"`) → analysis text
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub analyses: Option<BTreeMap<String, String>>,
}

impl AggregatedResponse {
    /// Assemble a response; status follows from whether any source failed.
    pub fn new(
        query_params: QueryParams,
        datasets: Vec<Dataset>,
        errors: BTreeMap<String, Vec<String>>,
    ) -> Self {
        let (status, error_summary) = if errors.is_empty() {
            (ResponseStatus::Completed, None)
        } else {
            (ResponseStatus::PartialSuccess, Some(errors))
        };
        Self {
            query_params,
            timestamp: Utc::now(),
            datasets,
            status,
            error_summary,
            analyses: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == ResponseStatus::Completed
    }

    /// Number of sources that failed.
    pub fn failed_count(&self) -> usize {
        self.error_summary.as_ref().map_or(0, |e| e.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_follows_error_summary() {
        let params = QueryParams::new("gdp", "NPL", 2000, 2001);
        let ok = AggregatedResponse::new(params.clone(), vec![], BTreeMap::new());
        assert_eq!(ok.status, ResponseStatus::Completed);
        assert!(ok.error_summary.is_none());

        let mut errors = BTreeMap::new();
        errors.insert("oecd".to_string(), vec!["boom".to_string()]);
        let partial = AggregatedResponse::new(params, vec![], errors);
        assert_eq!(partial.status, ResponseStatus::PartialSuccess);
        assert_eq!(partial.failed_count(), 1);
    }

    #[test]
    fn test_serializes_without_empty_optionals() {
        let params = QueryParams::new("gdp", "NPL", 2000, 2001);
        let response = AggregatedResponse::new(params, vec![], BTreeMap::new());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "completed");
        assert!(json.get("error_summary").is_none());
        assert!(json.get("analyses").is_none());
    }
}
