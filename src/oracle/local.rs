//! Deterministic in-process training oracle
//!
//! Trains a real estimator (logistic regression or a gini decision tree) on
//! the processed rows and reports honest held-out metrics. No randomness
//! anywhere: the split is ordered, weights start at zero, and tree splits are
//! scanned in feature order, so repeated evaluations of the same request
//! produce identical results.

use super::{
    FeatureImportance, ModelKind, TrainingOracle, TrainingRequest, TrainingResults,
};
use crate::dataset::{CellValue, Row};
use crate::error::{NeuroflowError, Result};
use ndarray::{s, Array1, Array2};
use std::collections::HashMap;
use std::future::Future;

const MAX_ITER: usize = 500;
const LEARNING_RATE: f64 = 0.1;
const L2_ALPHA: f64 = 0.01;
const TOL: f64 = 1e-6;
const MAX_TREE_DEPTH: usize = 4;

/// Local stand-in for the external evaluation service
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalOracle;

impl TrainingOracle for LocalOracle {
    fn evaluate(
        &self,
        request: &TrainingRequest,
    ) -> impl Future<Output = Result<TrainingResults>> + Send {
        let outcome = evaluate_request(request);
        async move { outcome }
    }
}

fn evaluate_request(request: &TrainingRequest) -> Result<TrainingResults> {
    if request.feature_columns.is_empty() {
        return Err(NeuroflowError::Oracle(
            "no feature columns selected".to_string(),
        ));
    }

    let x = design_matrix(&request.rows, &request.feature_columns)?;
    let (y, classes) = binary_target(&request.rows, &request.target_column)?;

    let n = x.nrows();
    if n < 2 {
        return Err(NeuroflowError::Oracle(
            "need at least two data rows to train and evaluate".to_string(),
        ));
    }

    // Ordered split; both sides are kept non-empty
    let n_train = ((n * request.split_ratio as usize) / 100).clamp(1, n - 1);
    let x_train = x.slice(s![..n_train, ..]).to_owned();
    let x_test = x.slice(s![n_train.., ..]).to_owned();
    let y_train = y.slice(s![..n_train]).to_owned();
    let y_test = y.slice(s![n_train..]).to_owned();

    let (y_pred, importances) = match request.model {
        ModelKind::LogisticRegression => {
            let model = LogisticModel::fit(&x_train, &y_train);
            (model.predict(&x_test), model.importances())
        }
        ModelKind::DecisionTree => {
            let model = TreeModel::fit(&x_train, &y_train, MAX_TREE_DEPTH);
            (model.predict(&x_test), model.importances)
        }
    };

    Ok(compose_results(request, &y_test, &y_pred, importances, &classes))
}

/// Build a row-major design matrix from the feature columns, label-encoding
/// any column that contains text cells.
fn design_matrix(rows: &[Row], feature_columns: &[String]) -> Result<Array2<f64>> {
    let n_rows = rows.len();
    let n_cols = feature_columns.len();

    let col_data: Vec<Vec<f64>> = feature_columns
        .iter()
        .map(|name| encode_column(rows, name))
        .collect::<Result<Vec<_>>>()?;

    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| {
        col_data[c][r]
    }))
}

/// Numeric columns pass through; mixed or text columns are label-encoded by
/// first-appearance order, which keeps the encoding deterministic.
fn encode_column(rows: &[Row], name: &str) -> Result<Vec<f64>> {
    let cells: Vec<&CellValue> = rows
        .iter()
        .map(|row| {
            row.get(name).ok_or_else(|| {
                NeuroflowError::Oracle(format!("feature column '{}' missing from a row", name))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if cells.iter().all(|c| c.is_numeric()) {
        return Ok(cells
            .iter()
            .map(|c| c.as_numeric().unwrap_or(0.0))
            .collect());
    }

    let mut codes: HashMap<&CellValue, f64> = HashMap::new();
    Ok(cells
        .iter()
        .map(|cell| {
            if let Some(&code) = codes.get(cell) {
                code
            } else {
                let code = codes.len() as f64;
                codes.insert(cell, code);
                code
            }
        })
        .collect())
}

/// Map the target column to 0/1 labels. The estimators are binary
/// classifiers, so exactly two distinct raw values are required.
fn binary_target(rows: &[Row], target: &str) -> Result<(Array1<f64>, [String; 2])> {
    let mut classes: Vec<&CellValue> = Vec::new();
    let mut labels = Vec::with_capacity(rows.len());

    for row in rows {
        let cell = row.get(target).ok_or_else(|| {
            NeuroflowError::Oracle(format!("target column '{}' missing from a row", target))
        })?;
        let idx = match classes.iter().position(|c| *c == cell) {
            Some(idx) => idx,
            None => {
                classes.push(cell);
                classes.len() - 1
            }
        };
        labels.push(idx as f64);
    }

    if classes.len() != 2 {
        return Err(NeuroflowError::Oracle(format!(
            "target column '{}' has {} distinct values; binary classification needs exactly 2",
            target,
            classes.len()
        )));
    }

    Ok((
        Array1::from_vec(labels),
        [classes[0].to_string(), classes[1].to_string()],
    ))
}

/// Logistic regression fitted by full-batch gradient descent
struct LogisticModel {
    weights: Array1<f64>,
    bias: f64,
    feature_means: Array1<f64>,
    feature_stds: Array1<f64>,
}

impl LogisticModel {
    fn fit(x: &Array2<f64>, y: &Array1<f64>) -> Self {
        // Standardize internally so gradient descent converges regardless of
        // which scaler (if any) the user picked upstream.
        let (feature_means, feature_stds) = column_moments(x);
        let x_std = standardize(x, &feature_means, &feature_stds);

        let n = x_std.nrows() as f64;
        let mut weights: Array1<f64> = Array1::zeros(x_std.ncols());
        let mut bias = 0.0;

        for _ in 0..MAX_ITER {
            let linear = x_std.dot(&weights) + bias;
            let predictions = linear.mapv(sigmoid);
            let errors = &predictions - y;

            let dw = (x_std.t().dot(&errors) / n) + L2_ALPHA * &weights;
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < TOL {
                break;
            }

            weights = weights - LEARNING_RATE * &dw;
            bias -= LEARNING_RATE * db;
        }

        Self {
            weights,
            bias,
            feature_means,
            feature_stds,
        }
    }

    fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        let x_std = standardize(x, &self.feature_means, &self.feature_stds);
        let linear = x_std.dot(&self.weights) + self.bias;
        linear.mapv(|z| if sigmoid(z) >= 0.5 { 1.0 } else { 0.0 })
    }

    fn importances(&self) -> Vec<f64> {
        self.weights.iter().map(|w| w.abs()).collect()
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn column_moments(x: &Array2<f64>) -> (Array1<f64>, Array1<f64>) {
    let n = x.nrows() as f64;
    let means = x.sum_axis(ndarray::Axis(0)) / n;
    let stds = Array1::from_shape_fn(x.ncols(), |j| {
        let mean = means[j];
        let var = x.column(j).iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        if std < 1e-10 {
            1.0
        } else {
            std
        }
    });
    (means, stds)
}

fn standardize(x: &Array2<f64>, means: &Array1<f64>, stds: &Array1<f64>) -> Array2<f64> {
    Array2::from_shape_fn(x.dim(), |(i, j)| (x[[i, j]] - means[j]) / stds[j])
}

/// Binary classification tree with gini splits
struct TreeModel {
    root: TreeNode,
    importances: Vec<f64>,
}

enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeModel {
    fn fit(x: &Array2<f64>, y: &Array1<f64>, max_depth: usize) -> Self {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        let mut importances = vec![0.0; x.ncols()];
        let root = build_tree(x, y, &indices, 0, max_depth, &mut importances);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }

        Self { root, importances }
    }

    fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        Array1::from_shape_fn(x.nrows(), |i| {
            let mut node = &self.root;
            loop {
                match node {
                    TreeNode::Leaf { value } => return *value,
                    TreeNode::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    } => {
                        node = if x[[i, *feature]] <= *threshold {
                            left
                        } else {
                            right
                        };
                    }
                }
            }
        })
    }
}

fn build_tree(
    x: &Array2<f64>,
    y: &Array1<f64>,
    indices: &[usize],
    depth: usize,
    max_depth: usize,
    importances: &mut [f64],
) -> TreeNode {
    let labels: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
    let parent_impurity = gini(&labels);

    if depth >= max_depth || indices.len() < 2 || parent_impurity == 0.0 {
        return TreeNode::Leaf {
            value: majority(&labels),
        };
    }

    let Some((feature, threshold)) = find_best_split(x, y, indices, parent_impurity) else {
        return TreeNode::Leaf {
            value: majority(&labels),
        };
    };

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .partition(|&&i| x[[i, feature]] <= threshold);

    if left_idx.is_empty() || right_idx.is_empty() {
        return TreeNode::Leaf {
            value: majority(&labels),
        };
    }

    let left_labels: Vec<f64> = left_idx.iter().map(|&i| y[i]).collect();
    let right_labels: Vec<f64> = right_idx.iter().map(|&i| y[i]).collect();
    let weighted_child = (left_idx.len() as f64 * gini(&left_labels)
        + right_idx.len() as f64 * gini(&right_labels))
        / indices.len() as f64;
    importances[feature] += indices.len() as f64 * (parent_impurity - weighted_child);

    TreeNode::Split {
        feature,
        threshold,
        left: Box::new(build_tree(x, y, &left_idx, depth + 1, max_depth, importances)),
        right: Box::new(build_tree(x, y, &right_idx, depth + 1, max_depth, importances)),
    }
}

fn find_best_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    indices: &[usize],
    parent_impurity: f64,
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    let mut best_gain = 0.0;

    for feature in 0..x.ncols() {
        let mut values: Vec<f64> = indices.iter().map(|&i| x[[i, feature]]).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        values.dedup();

        for window in values.windows(2) {
            let threshold = (window[0] + window[1]) / 2.0;

            let mut left = Vec::new();
            let mut right = Vec::new();
            for &i in indices {
                if x[[i, feature]] <= threshold {
                    left.push(y[i]);
                } else {
                    right.push(y[i]);
                }
            }
            if left.is_empty() || right.is_empty() {
                continue;
            }

            let n = indices.len() as f64;
            let weighted =
                (left.len() as f64 * gini(&left) + right.len() as f64 * gini(&right)) / n;
            let gain = parent_impurity - weighted;
            if gain > best_gain {
                best_gain = gain;
                best = Some((feature, threshold));
            }
        }
    }

    best
}

fn gini(labels: &[f64]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let p = labels.iter().sum::<f64>() / labels.len() as f64;
    2.0 * p * (1.0 - p)
}

fn majority(labels: &[f64]) -> f64 {
    let p = labels.iter().sum::<f64>() / labels.len().max(1) as f64;
    if p >= 0.5 {
        1.0
    } else {
        0.0
    }
}

fn compose_results(
    request: &TrainingRequest,
    y_true: &Array1<f64>,
    y_pred: &Array1<f64>,
    raw_importances: Vec<f64>,
    classes: &[String; 2],
) -> TrainingResults {
    let mut tp = 0u32;
    let mut fp = 0u32;
    let mut tn = 0u32;
    let mut fn_ = 0u32;
    for (t, p) in y_true.iter().zip(y_pred.iter()) {
        match (*t > 0.5, *p > 0.5) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (false, false) => tn += 1,
            (true, false) => fn_ += 1,
        }
    }

    let n = y_true.len() as f64;
    let accuracy = (tp + tn) as f64 / n.max(1.0);
    let precision = if tp + fp > 0 {
        tp as f64 / (tp + fp) as f64
    } else {
        0.0
    };
    let recall = if tp + fn_ > 0 {
        tp as f64 / (tp + fn_) as f64
    } else {
        0.0
    };
    let f1_score = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    let total: f64 = raw_importances.iter().sum();
    let mut feature_importance: Vec<FeatureImportance> = request
        .feature_columns
        .iter()
        .zip(raw_importances.iter())
        .map(|(name, &imp)| FeatureImportance {
            name: name.clone(),
            value: if total > 0.0 { imp / total } else { 0.0 },
        })
        .collect();
    feature_importance.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let top_feature = feature_importance
        .first()
        .map(|f| f.name.clone())
        .unwrap_or_else(|| "n/a".to_string());
    let insights = format!(
        "{} reached {:.1}% held-out accuracy on a {}/{} split of {} rows ({} scaling). \
         Most influential feature: {}. Positive class: '{}'.",
        request.model,
        accuracy * 100.0,
        request.split_ratio,
        100 - request.split_ratio,
        request.rows.len(),
        request.scaler_choice,
        top_feature,
        classes[1],
    );

    TrainingResults {
        accuracy,
        precision,
        recall,
        f1_score,
        confusion_matrix: [[tp, fp], [fn_, tn]],
        feature_importance,
        insights,
    }
}
