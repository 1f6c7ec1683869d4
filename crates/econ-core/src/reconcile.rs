//! Merge per-source datasets into one series.
//!
//! [`MergePolicy::PriorityFallback`] is the system of record: World Bank wins,
//! IMF fills gaps, OECD and UN never contribute to the merged series.
//! [`MergePolicy::Average`] is kept for comparison runs only.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use econ_sources::units::convert_dataset;
use econ_sources::{DataPoint, DataSource, Dataset, Magnitude, Metadata};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

pub const MERGED_CODE: &str = "merged";
pub const MERGED_NAME: &str = "Merged Data";

/// How overlapping years from several sources are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    #[default]
    PriorityFallback,
    /// Mean of World Bank and IMF when both report a value
    Average,
}

/// Merge `datasets` under `policy`. All inputs are rescaled to trillions first.
///
/// A single input passes through with its points unchanged apart from the
/// rescale. An empty input is a total failure.
pub fn merge_datasets(datasets: &[Dataset], policy: MergePolicy) -> PipelineResult<Dataset> {
    if datasets.is_empty() {
        return Err(PipelineError::AllSourcesFailed {
            errors: BTreeMap::new(),
        });
    }

    let normalized: Vec<Dataset> = datasets
        .iter()
        .cloned()
        .map(|mut ds| {
            convert_dataset(&mut ds, Magnitude::Trillions);
            ds
        })
        .collect();

    let data = if let [only] = normalized.as_slice() {
        only.data
            .iter()
            .map(|p| tag_origin(p.clone(), only.source()))
            .collect()
    } else {
        merge_points(&normalized, policy)
    };

    debug!(
        inputs = datasets.len(),
        points = data.len(),
        policy = ?policy,
        "Merged datasets"
    );

    Ok(Dataset::new(merged_metadata(), data))
}

fn merge_points(datasets: &[Dataset], policy: MergePolicy) -> Vec<DataPoint> {
    let world_bank = datasets.iter().find(|d| d.source() == DataSource::WorldBank);
    let imf = datasets.iter().find(|d| d.source() == DataSource::Imf);

    let years: BTreeSet<i32> = datasets
        .iter()
        .flat_map(|d| d.data.iter().map(|p| p.year))
        .collect();

    let mut merged = Vec::with_capacity(years.len());
    for year in years {
        let wb_point = world_bank.and_then(|d| d.point_for_year(year));
        let imf_point = imf.and_then(|d| d.point_for_year(year));

        let point = match (wb_point, imf_point, policy) {
            (Some(wb), Some(imf), MergePolicy::Average) => {
                let mut point = tag_origin(wb.clone(), DataSource::WorldBank);
                point.value = match (wb.value, imf.value) {
                    (Some(a), Some(b)) => Some((a + b) / 2.0),
                    (a, b) => a.or(b),
                };
                if wb.value.is_some() && imf.value.is_some() {
                    point
                        .source_metadata
                        .insert("source".to_string(), "average".into());
                }
                point
            }
            (Some(wb), _, _) => tag_origin(wb.clone(), DataSource::WorldBank),
            (None, Some(imf), _) => tag_origin(imf.clone(), DataSource::Imf),
            (None, None, _) => continue,
        };
        merged.push(point);
    }
    merged
}

fn tag_origin(mut point: DataPoint, origin: DataSource) -> DataPoint {
    point
        .source_metadata
        .insert("source".to_string(), origin.as_str().into());
    point
}

fn merged_metadata() -> Metadata {
    Metadata {
        source: DataSource::WorldBank,
        indicator_code: MERGED_CODE.to_string(),
        indicator_name: MERGED_NAME.to_string(),
        last_updated: Utc::now(),
        frequency: "yearly".to_string(),
        unit: Magnitude::Trillions.as_str().to_string(),
    }
}
