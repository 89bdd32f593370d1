//! Training oracle boundary
//!
//! The pipeline never trains models itself; it hands the processed dataset
//! and configuration to a [`TrainingOracle`] and stores whatever evaluation
//! comes back. Two implementations are provided:
//! - [`LocalOracle`] — deterministic in-process estimators, also used in tests
//! - [`RemoteOracle`] — HTTP client for an external evaluation service

mod local;
mod remote;

pub use local::LocalOracle;
pub use remote::{OracleConfig, RemoteOracle};

use crate::dataset::{ColumnStats, Row, ScalerChoice};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Number of processed rows a remote oracle sends as context
pub const SAMPLE_ROWS: usize = 10;

/// Model family the oracle is asked to evaluate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    LogisticRegression,
    DecisionTree,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelKind::LogisticRegression => write!(f, "LogisticRegression"),
            ModelKind::DecisionTree => write!(f, "DecisionTree"),
        }
    }
}

impl std::str::FromStr for ModelKind {
    type Err = crate::error::NeuroflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "logisticregression" | "logistic-regression" | "logistic" => {
                Ok(ModelKind::LogisticRegression)
            }
            "decisiontree" | "decision-tree" | "tree" => Ok(ModelKind::DecisionTree),
            other => Err(crate::error::NeuroflowError::Validation(format!(
                "unknown model '{}' (expected logistic-regression or decision-tree)",
                other
            ))),
        }
    }
}

/// Everything an oracle needs to evaluate one training run.
///
/// `rows` are the full processed rows; remote implementations send only the
/// first [`SAMPLE_ROWS`] of them over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRequest {
    pub rows: Vec<Row>,
    pub column_stats: Vec<ColumnStats>,
    pub target_column: String,
    /// Feature columns in dataset column order
    pub feature_columns: Vec<String>,
    pub scaler_choice: ScalerChoice,
    pub split_ratio: u8,
    pub model: ModelKind,
}

impl TrainingRequest {
    /// The leading rows a remote oracle includes as context
    pub fn sample(&self) -> &[Row] {
        let n = self.rows.len().min(SAMPLE_ROWS);
        &self.rows[..n]
    }
}

/// One feature's contribution to the trained model, in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub name: String,
    pub value: f64,
}

/// Evaluation metrics returned by a training oracle.
///
/// Serialized with camelCase keys to match the external service's wire
/// format. The confusion matrix is laid out as [[TP, FP], [FN, TN]].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingResults {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub confusion_matrix: [[u32; 2]; 2],
    pub feature_importance: Vec<FeatureImportance>,
    pub insights: String,
}

/// External prediction/evaluation capability.
///
/// Strictly a request/response boundary: how the oracle derives its numbers
/// is out of scope for the pipeline. Failures surface as
/// [`NeuroflowError::Oracle`](crate::error::NeuroflowError::Oracle).
pub trait TrainingOracle {
    fn evaluate(
        &self,
        request: &TrainingRequest,
    ) -> impl Future<Output = Result<TrainingResults>> + Send;
}
