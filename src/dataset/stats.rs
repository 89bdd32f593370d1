//! Per-column type inference and descriptive statistics

use super::{CellValue, ColumnStats, ColumnType, Row};
use std::collections::HashSet;

/// Compute statistics for every column, in column order.
///
/// A column is numeric iff every row produced a numeric cell for it; a single
/// text cell anywhere makes the whole column categorical. Numeric columns get
/// min/max/mean and the population standard deviation (divisor n). Every
/// column gets a distinct-value count. Pure function of its inputs.
pub fn calculate_stats(rows: &[Row], columns: &[String]) -> Vec<ColumnStats> {
    columns
        .iter()
        .map(|col| {
            let values: Vec<&CellValue> = rows.iter().filter_map(|r| r.get(col)).collect();
            let unique_values = values.iter().copied().collect::<HashSet<_>>().len();

            let numeric: Vec<f64> = values.iter().filter_map(|v| v.as_numeric()).collect();
            let is_numeric = !values.is_empty() && numeric.len() == values.len();

            if !is_numeric {
                return ColumnStats {
                    name: col.clone(),
                    column_type: ColumnType::Categorical,
                    min: None,
                    max: None,
                    mean: None,
                    std: None,
                    unique_values,
                };
            }

            let n = numeric.len() as f64;
            let min = numeric.iter().copied().fold(f64::INFINITY, f64::min);
            let max = numeric.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = numeric.iter().sum::<f64>() / n;
            let variance = numeric.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

            ColumnStats {
                name: col.clone(),
                column_type: ColumnType::Numeric,
                min: Some(min),
                max: Some(max),
                mean: Some(mean),
                std: Some(variance.sqrt()),
                unique_values,
            }
        })
        .collect()
}
