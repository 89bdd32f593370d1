//! Dataset model and ingestion/transform pipeline
//!
//! Provides the tabular data model and the three pure stages that derive it:
//! - CSV parsing with quote-aware field splitting
//! - Per-column type inference and descriptive statistics
//! - Optional numeric feature scaling

mod parser;
mod scaler;
mod stats;

pub use parser::parse;
pub use scaler::{apply_scaling, ScalerChoice};
pub use stats::calculate_stats;

use crate::error::{ParseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

/// A single typed cell in a parsed dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Numeric(f64),
    Text(String),
}

impl CellValue {
    /// Numeric payload, if this cell parsed as a number
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            CellValue::Numeric(v) => Some(*v),
            CellValue::Text(_) => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, CellValue::Numeric(_))
    }
}

// Bit pattern with -0.0 folded into 0.0, so the two zeros count as one value
fn canonical_bits(v: f64) -> u64 {
    if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}

// Value equality: numeric cells compare by canonical bit pattern so that
// cells can be counted in hash sets. `Numeric(1.0)` and `Text("1")` are
// distinct values.
impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Numeric(a), CellValue::Numeric(b)) => {
                canonical_bits(*a) == canonical_bits(*b)
            }
            (CellValue::Text(a), CellValue::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for CellValue {}

impl Hash for CellValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            CellValue::Numeric(v) => {
                0u8.hash(state);
                canonical_bits(*v).hash(state);
            }
            CellValue::Text(s) => {
                1u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Numeric(v) => write!(f, "{}", v),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One parsed data row, keyed by column name
pub type Row = HashMap<String, CellValue>;

/// Column data type inferred column-wide from parsed cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Numeric,
    Categorical,
}

/// Per-column type and descriptive statistics.
///
/// `min`/`max`/`mean`/`std` are present only for numeric columns; `std` is the
/// population standard deviation (divisor n). `unique_values` counts distinct
/// raw cell values and is present for every column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub name: String,
    pub column_type: ColumnType,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub unique_values: usize,
}

/// The loaded table plus derived statistics and user-assigned column roles.
///
/// Invariants: `processed_rows.len() == raw rows len`; the target column is
/// never in `feature_columns`; stats are computed once from the raw rows at
/// construction and never change afterwards. All fields are private so these
/// invariants can only be affected through the mutation methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    raw_rows: Vec<Row>,
    processed_rows: Vec<Row>,
    column_names: Vec<String>,
    stats: Vec<ColumnStats>,
    target_column: Option<String>,
    feature_columns: HashSet<String>,
}

impl Dataset {
    /// Parse CSV text into a dataset with computed statistics.
    ///
    /// Processed rows start as a copy of the raw rows; scaling is applied
    /// later via [`Dataset::recompute_processed`].
    pub fn from_csv(text: &str) -> std::result::Result<Self, ParseError> {
        let (rows, columns) = parse(text)?;
        let stats = calculate_stats(&rows, &columns);

        Ok(Self {
            processed_rows: rows.clone(),
            raw_rows: rows,
            column_names: columns,
            stats,
            target_column: None,
            feature_columns: HashSet::new(),
        })
    }

    /// The rows exactly as parsed, before any scaling
    pub fn raw_rows(&self) -> &[Row] {
        &self.raw_rows
    }

    /// The derived row set the current scaler choice produced
    pub fn processed_rows(&self) -> &[Row] {
        &self.processed_rows
    }

    /// Column names in header order
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn n_rows(&self) -> usize {
        self.raw_rows.len()
    }

    pub fn stats(&self) -> &[ColumnStats] {
        &self.stats
    }

    /// Statistics entry for a column, if it exists
    pub fn stat(&self, name: &str) -> Option<&ColumnStats> {
        self.stats.iter().find(|s| s.name == name)
    }

    pub fn target_column(&self) -> Option<&str> {
        self.target_column.as_deref()
    }

    pub fn feature_columns(&self) -> &HashSet<String> {
        &self.feature_columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_names.iter().any(|c| c == name)
    }

    /// Derived-state refresh: rebuild `processed_rows` from the raw rows.
    ///
    /// Always recomputed from scratch, never patched incrementally, so the
    /// result depends only on the raw rows, the stats, the scaler choice, and
    /// the current target column.
    pub fn recompute_processed(&mut self, choice: ScalerChoice) {
        self.processed_rows = apply_scaling(
            &self.raw_rows,
            &self.stats,
            choice,
            self.target_column.as_deref(),
        );
    }

    /// Set the target column, enforcing role exclusivity: a column cannot be
    /// both target and feature, so it is removed from the feature set.
    pub fn set_target(&mut self, column: &str) -> Result<()> {
        if !self.has_column(column) {
            return Err(crate::error::NeuroflowError::Validation(format!(
                "unknown column '{}'",
                column
            )));
        }
        self.feature_columns.remove(column);
        self.target_column = Some(column.to_string());
        Ok(())
    }

    /// Add or remove a feature column. Toggling the current target is a no-op.
    pub fn toggle_feature(&mut self, column: &str) -> Result<()> {
        if !self.has_column(column) {
            return Err(crate::error::NeuroflowError::Validation(format!(
                "unknown column '{}'",
                column
            )));
        }
        if self.target_column.as_deref() == Some(column) {
            return Ok(());
        }
        if !self.feature_columns.remove(column) {
            self.feature_columns.insert(column.to_string());
        }
        Ok(())
    }

    /// True when a target is set and at least one feature is selected
    pub fn roles_valid(&self) -> bool {
        self.target_column.is_some() && !self.feature_columns.is_empty()
    }

    /// Selected feature columns in dataset column order
    pub fn ordered_features(&self) -> Vec<String> {
        self.column_names
            .iter()
            .filter(|c| self.feature_columns.contains(*c))
            .cloned()
            .collect()
    }
}
