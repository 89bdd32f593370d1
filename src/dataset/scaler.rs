//! Numeric feature scaling

use super::{CellValue, ColumnStats, ColumnType, Row};
use serde::{Deserialize, Serialize};

/// Normalization strategy applied to numeric feature columns before training
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScalerChoice {
    /// Identity transform
    #[default]
    None,
    /// (v - min) / (max - min)
    MinMax,
    /// (v - mean) / std (z-score)
    Standard,
}

impl std::fmt::Display for ScalerChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalerChoice::None => write!(f, "None"),
            ScalerChoice::MinMax => write!(f, "MinMax"),
            ScalerChoice::Standard => write!(f, "Standard"),
        }
    }
}

impl std::str::FromStr for ScalerChoice {
    type Err = crate::error::NeuroflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(ScalerChoice::None),
            "minmax" | "min-max" => Ok(ScalerChoice::MinMax),
            "standard" | "zscore" | "z-score" => Ok(ScalerChoice::Standard),
            other => Err(crate::error::NeuroflowError::Validation(format!(
                "unknown scaler '{}' (expected none, minmax, or standard)",
                other
            ))),
        }
    }
}

/// Apply the chosen scaling to every numeric column except the target.
///
/// Pure transform: the input rows are never mutated. `None` returns a
/// structurally equal copy. Constant columns (zero range or zero std) are
/// left unchanged instead of dividing by zero. Scaled values are rounded to
/// four decimal places before being stored. Categorical columns and the
/// target column are never touched, so label values are never rescaled.
pub fn apply_scaling(
    rows: &[Row],
    stats: &[ColumnStats],
    choice: ScalerChoice,
    target_column: Option<&str>,
) -> Vec<Row> {
    if choice == ScalerChoice::None {
        return rows.to_vec();
    }

    rows.iter()
        .map(|row| {
            let mut new_row = row.clone();
            for stat in stats {
                if stat.column_type != ColumnType::Numeric
                    || target_column == Some(stat.name.as_str())
                {
                    continue;
                }
                let Some(CellValue::Numeric(v)) = new_row.get(&stat.name) else {
                    continue;
                };
                if let Some(scaled) = scale_value(*v, stat, choice) {
                    new_row.insert(stat.name.clone(), CellValue::Numeric(round4(scaled)));
                }
            }
            new_row
        })
        .collect()
}

/// Scale a single value, or `None` when the column is constant and the value
/// must be left as-is.
fn scale_value(v: f64, stat: &ColumnStats, choice: ScalerChoice) -> Option<f64> {
    match choice {
        ScalerChoice::MinMax => match (stat.min, stat.max) {
            (Some(min), Some(max)) if max != min => Some((v - min) / (max - min)),
            _ => None,
        },
        ScalerChoice::Standard => match (stat.mean, stat.std) {
            (Some(mean), Some(std)) if std != 0.0 => Some((v - mean) / std),
            _ => None,
        },
        ScalerChoice::None => None,
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}
