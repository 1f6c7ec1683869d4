//! Magnitude detection and cross-source unit normalization.
//!
//! Each adapter classifies its series by the integer digit count of the first
//! non-null value. World Bank and UN publish that class into the per-request
//! [`UnitSignal`]; once every source has answered, [`normalize_datasets`]
//! resolves one target magnitude from the signal and rescales every dataset
//! onto it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::schema::{DataSource, Dataset};

/// Order-of-magnitude bucket a series is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Magnitude {
    Units,
    Thousands,
    Millions,
    Billions,
    Trillions,
    #[default]
    Unknown,
}

impl Magnitude {
    pub fn as_str(&self) -> &'static str {
        match self {
            Magnitude::Units => "units",
            Magnitude::Thousands => "thousands",
            Magnitude::Millions => "millions",
            Magnitude::Billions => "billions",
            Magnitude::Trillions => "trillions",
            Magnitude::Unknown => "unknown",
        }
    }

    /// Parse a unit label. Anything that is not a magnitude class is `Unknown`.
    pub fn from_label(label: &str) -> Magnitude {
        match label.trim().to_ascii_lowercase().as_str() {
            "units" => Magnitude::Units,
            "thousands" => Magnitude::Thousands,
            "millions" => Magnitude::Millions,
            "billions" => Magnitude::Billions,
            "trillions" => Magnitude::Trillions,
            _ => Magnitude::Unknown,
        }
    }

    /// Classify a value by the number of digits in its integer part.
    ///
    /// ≤6 digits → units, ≤9 → millions, ≤12 → billions, otherwise trillions.
    pub fn detect(value: f64) -> Magnitude {
        if !value.is_finite() {
            return Magnitude::Unknown;
        }
        let digits = format!("{:.0}", value.abs().trunc()).len();
        match digits {
            0..=6 => Magnitude::Units,
            7..=9 => Magnitude::Millions,
            10..=12 => Magnitude::Billions,
            _ => Magnitude::Trillions,
        }
    }

    /// Size of one unit of this magnitude relative to trillions.
    ///
    /// Units, thousands and unknown labels all count as 1.0.
    pub fn factor(&self) -> f64 {
        match self {
            Magnitude::Millions => 1e-6,
            Magnitude::Billions => 1e-3,
            _ => 1.0,
        }
    }
}

impl std::fmt::Display for Magnitude {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rescale `value` from `from` to `to`.
pub fn convert(value: f64, from: Magnitude, to: Magnitude) -> f64 {
    value * from.factor() / to.factor()
}

/// Magnitudes published by the World Bank and UN adapters for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitSignal {
    pub wb_unit: Magnitude,
    pub un_unit: Magnitude,
}

impl UnitSignal {
    /// Record `unit` for `source`. Only World Bank and UN may write; returns
    /// whether the signal changed.
    pub fn publish(&mut self, source: DataSource, unit: Magnitude) -> bool {
        match source {
            DataSource::WorldBank => self.wb_unit = unit,
            DataSource::Un => self.un_unit = unit,
            DataSource::Imf | DataSource::Oecd => return false,
        }
        true
    }

    /// Resolve the common target magnitude.
    ///
    /// Checks run in a fixed order and each match overrides the previous one,
    /// so the last matching class wins.
    pub fn target(&self) -> Magnitude {
        let either = |m: Magnitude| self.wb_unit == m || self.un_unit == m;

        let mut target = Magnitude::Trillions;
        if either(Magnitude::Billions) {
            target = Magnitude::Billions;
        }
        if either(Magnitude::Millions) {
            target = Magnitude::Millions;
        }
        if either(Magnitude::Units) {
            target = Magnitude::Units;
        }
        if either(Magnitude::Thousands) {
            target = Magnitude::Thousands;
        }
        target
    }
}

/// Detect the magnitude class of a dataset from its first non-null value.
pub fn detect_dataset_unit(dataset: &Dataset) -> Magnitude {
    dataset
        .first_value()
        .map(Magnitude::detect)
        .unwrap_or(Magnitude::Unknown)
}

/// Rewrite every value of `dataset` from its current magnitude to `target`.
///
/// A point's current magnitude is its `unit` hint when present, otherwise the
/// dataset's unit label. Afterwards the dataset and every point carry `target`.
pub fn convert_dataset(dataset: &mut Dataset, target: Magnitude) {
    let dataset_unit = Magnitude::from_label(&dataset.metadata.unit);
    for point in &mut dataset.data {
        let current = point
            .unit_hint()
            .map(Magnitude::from_label)
            .unwrap_or(dataset_unit);
        if let Some(value) = point.value {
            point.value = Some(convert(value, current, target));
        }
        point
            .source_metadata
            .insert("unit".to_string(), target.as_str().into());
    }
    dataset.metadata.unit = target.as_str().to_string();
}

/// IMF returns already-aggregated figures in a smaller base than World Bank
/// and UN. When the IMF series classifies as `units`, scale it up before the
/// generic conversion and re-detect its magnitude.
///
/// Returns the multiplier that was applied.
pub fn adjust_imf_digits(dataset: &mut Dataset, target: Magnitude) -> f64 {
    if detect_dataset_unit(dataset) != Magnitude::Units {
        return 1.0;
    }
    let multiplier = match target {
        Magnitude::Trillions => 1e9,
        Magnitude::Billions | Magnitude::Millions => 1e3,
        _ => 1.0,
    };
    if multiplier != 1.0 {
        for point in &mut dataset.data {
            point.value = point.value.map(|v| v * multiplier);
            point.source_metadata.remove("unit");
        }
    }
    dataset.metadata.unit = detect_dataset_unit(dataset).as_str().to_string();
    multiplier
}

/// Bring every dataset onto the magnitude resolved from `signal`.
///
/// Must run after all sources of a request have answered, so the signal is
/// final. Returns the target that was applied.
pub fn normalize_datasets(datasets: &mut [Dataset], signal: &UnitSignal) -> Magnitude {
    let target = signal.target();
    for dataset in datasets.iter_mut() {
        if dataset.source() == DataSource::Imf {
            let multiplier = adjust_imf_digits(dataset, target);
            debug!(multiplier, "Applied IMF digit adjustment");
        }
        convert_dataset(dataset, target);
    }
    debug!(target = %target, wb = %signal.wb_unit, un = %signal.un_unit, "Normalized datasets");
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataPoint, Metadata};
    use chrono::Utc;

    fn dataset(source: DataSource, unit: &str, values: &[(i32, f64)]) -> Dataset {
        Dataset::new(
            Metadata {
                source,
                indicator_code: "X".to_string(),
                indicator_name: String::new(),
                last_updated: Utc::now(),
                frequency: "yearly".to_string(),
                unit: unit.to_string(),
            },
            values
                .iter()
                .map(|(y, v)| DataPoint::new(Some(*v), *y, "NPL"))
                .collect(),
        )
    }

    #[test]
    fn test_detect_by_digit_count() {
        assert_eq!(Magnitude::detect(0.5), Magnitude::Units);
        assert_eq!(Magnitude::detect(999_999.0), Magnitude::Units);
        assert_eq!(Magnitude::detect(1_000_000.0), Magnitude::Millions);
        assert_eq!(Magnitude::detect(-123_456_789.0), Magnitude::Millions);
        assert_eq!(Magnitude::detect(24_000_000_000.0), Magnitude::Billions);
        assert_eq!(Magnitude::detect(1.5e13), Magnitude::Trillions);
        assert_eq!(Magnitude::detect(f64::NAN), Magnitude::Unknown);
    }

    #[test]
    fn test_millions_trillions_round_trip() {
        let original = 12_345.678;
        let up = convert(original, Magnitude::Millions, Magnitude::Trillions);
        let back = convert(up, Magnitude::Trillions, Magnitude::Millions);
        assert!((back - original).abs() < 1e-9 * original.abs());
    }

    #[test]
    fn test_unknown_counts_as_trillions() {
        assert_eq!(convert(7.0, Magnitude::Unknown, Magnitude::Trillions), 7.0);
        assert_eq!(
            convert(7.0, Magnitude::Unknown, Magnitude::Billions),
            7.0 / 1e-3
        );
    }

    #[test]
    fn test_target_defaults_to_trillions() {
        assert_eq!(UnitSignal::default().target(), Magnitude::Trillions);
    }

    #[test]
    fn test_target_override_order() {
        let signal = UnitSignal {
            wb_unit: Magnitude::Billions,
            un_unit: Magnitude::Millions,
        };
        assert_eq!(signal.target(), Magnitude::Millions);

        let signal = UnitSignal {
            wb_unit: Magnitude::Units,
            un_unit: Magnitude::Thousands,
        };
        assert_eq!(signal.target(), Magnitude::Thousands);

        let signal = UnitSignal {
            wb_unit: Magnitude::Trillions,
            un_unit: Magnitude::Billions,
        };
        assert_eq!(signal.target(), Magnitude::Billions);
    }

    #[test]
    fn test_only_world_bank_and_un_publish() {
        let mut signal = UnitSignal::default();
        assert!(!signal.publish(DataSource::Imf, Magnitude::Units));
        assert!(!signal.publish(DataSource::Oecd, Magnitude::Units));
        assert_eq!(signal, UnitSignal::default());

        assert!(signal.publish(DataSource::WorldBank, Magnitude::Billions));
        assert!(signal.publish(DataSource::Un, Magnitude::Millions));
        assert_eq!(signal.wb_unit, Magnitude::Billions);
        assert_eq!(signal.un_unit, Magnitude::Millions);
    }

    #[test]
    fn test_convert_dataset_rewrites_value_and_unit() {
        let mut ds = dataset(DataSource::WorldBank, "millions", &[(2010, 5.0)]);
        convert_dataset(&mut ds, Magnitude::Trillions);
        assert_eq!(ds.metadata.unit, "trillions");
        assert!((ds.data[0].value.unwrap() - 5e-6).abs() < 1e-18);
        assert_eq!(ds.data[0].unit_hint(), Some("trillions"));
    }

    #[test]
    fn test_point_hint_overrides_dataset_unit() {
        let mut ds = dataset(DataSource::WorldBank, "trillions", &[(2010, 2.0)]);
        ds.data[0]
            .source_metadata
            .insert("unit".to_string(), "billions".into());
        convert_dataset(&mut ds, Magnitude::Trillions);
        assert!((ds.data[0].value.unwrap() - 2e-3).abs() < 1e-15);
    }

    #[test]
    fn test_imf_digit_adjustment() {
        let mut ds = dataset(DataSource::Imf, "", &[(2010, 5.0)]);
        assert_eq!(adjust_imf_digits(&mut ds, Magnitude::Trillions), 1e9);
        assert_eq!(ds.data[0].value, Some(5e9));
        assert_eq!(ds.metadata.unit, "billions");

        let mut ds = dataset(DataSource::Imf, "", &[(2010, 5.0)]);
        assert_eq!(adjust_imf_digits(&mut ds, Magnitude::Millions), 1e3);
        assert_eq!(ds.data[0].value, Some(5e3));

        let mut ds = dataset(DataSource::Imf, "", &[(2010, 5.0)]);
        assert_eq!(adjust_imf_digits(&mut ds, Magnitude::Units), 1.0);

        let mut ds = dataset(DataSource::Imf, "", &[(2010, 5e10)]);
        assert_eq!(adjust_imf_digits(&mut ds, Magnitude::Trillions), 1.0);
        assert_eq!(ds.data[0].value, Some(5e10));
    }

    #[test]
    fn test_normalize_datasets_uses_signal_target() {
        let mut datasets = vec![
            dataset(DataSource::WorldBank, "millions", &[(2010, 10.0)]),
            dataset(DataSource::Oecd, "billions", &[(2010, 1.0)]),
        ];
        let signal = UnitSignal {
            wb_unit: Magnitude::Millions,
            un_unit: Magnitude::Unknown,
        };
        let target = normalize_datasets(&mut datasets, &signal);
        assert_eq!(target, Magnitude::Millions);
        assert_eq!(datasets[0].data[0].value, Some(10.0));
        assert!((datasets[1].data[0].value.unwrap() - 1000.0).abs() < 1e-9);
        assert!(datasets.iter().all(|d| d.metadata.unit == "millions"));
    }
}
