//! Integration test: full pipeline walk from upload to results

use neuroflow_automl::dataset::ScalerChoice;
use neuroflow_automl::error::{NeuroflowError, Result};
use neuroflow_automl::oracle::{
    LocalOracle, ModelKind, TrainingOracle, TrainingRequest, TrainingResults,
};
use neuroflow_automl::pipeline::{Pipeline, Stage};
use std::future::Future;

fn sample_csv() -> String {
    let mut csv = String::from("hours,attempts,passed\n");
    for i in 0..30 {
        let passed = if i < 15 { "no" } else { "yes" };
        csv.push_str(&format!("{},{},{}\n", i, (i * 7) % 5, passed));
    }
    csv
}

/// Oracle that always fails, for exercising the failure path
struct OfflineOracle;

impl TrainingOracle for OfflineOracle {
    fn evaluate(
        &self,
        _request: &TrainingRequest,
    ) -> impl Future<Output = Result<TrainingResults>> + Send {
        async { Err(NeuroflowError::Oracle("service unreachable".to_string())) }
    }
}

#[tokio::test]
async fn test_full_walk_to_results() {
    let mut pipeline = Pipeline::new(LocalOracle);
    pipeline.state.load_dataset(&sample_csv()).unwrap();
    assert_eq!(pipeline.state.stage(), Stage::Preprocess);

    pipeline.state.set_target("passed").unwrap();
    pipeline.state.toggle_feature("hours").unwrap();
    pipeline.state.toggle_feature("attempts").unwrap();
    pipeline.state.set_scaler(ScalerChoice::MinMax);

    pipeline.state.next().unwrap();
    assert_eq!(pipeline.state.stage(), Stage::Split);
    pipeline.state.set_split_ratio(70);

    pipeline.state.next().unwrap();
    pipeline
        .state
        .select_model(ModelKind::DecisionTree)
        .unwrap();

    pipeline.run_training().await.unwrap();

    let state = &pipeline.state;
    assert_eq!(state.stage(), Stage::Results);
    assert!(!state.training_in_progress());
    assert!(state.last_error().is_none());

    let results = state.results().unwrap();
    assert!(results.accuracy > 0.8, "accuracy was {}", results.accuracy);
    let m = results.confusion_matrix;
    assert_eq!(m[0][0] + m[0][1] + m[1][0] + m[1][1], 9);
}

#[tokio::test]
async fn test_results_only_reachable_through_training() {
    let mut pipeline = Pipeline::new(LocalOracle);
    pipeline.state.load_dataset(&sample_csv()).unwrap();
    pipeline.state.set_target("passed").unwrap();
    pipeline.state.toggle_feature("hours").unwrap();
    pipeline.state.next().unwrap();
    pipeline.state.next().unwrap();
    assert_eq!(pipeline.state.stage(), Stage::ModelSelect);

    // Next is not offered at ModelSelect; training is the only way forward
    pipeline.state.next().unwrap();
    assert_eq!(pipeline.state.stage(), Stage::ModelSelect);
    assert!(pipeline.state.results().is_none());

    pipeline
        .state
        .select_model(ModelKind::DecisionTree)
        .unwrap();
    pipeline.run_training().await.unwrap();
    assert_eq!(pipeline.state.stage(), Stage::Results);
    assert!(pipeline.state.results().is_some());
}

#[tokio::test]
async fn test_validation_blocks_then_clears() {
    let mut pipeline = Pipeline::new(LocalOracle);
    pipeline.state.load_dataset(&sample_csv()).unwrap();

    // No roles assigned yet
    assert!(pipeline.state.next().is_err());
    assert_eq!(pipeline.state.stage(), Stage::Preprocess);
    assert!(pipeline.state.last_error().is_some());

    pipeline.state.set_target("passed").unwrap();
    pipeline.state.toggle_feature("hours").unwrap();
    pipeline.state.next().unwrap();
    assert_eq!(pipeline.state.stage(), Stage::Split);
    assert!(pipeline.state.last_error().is_none());
}

#[tokio::test]
async fn test_oracle_failure_keeps_configuration_for_retry() {
    let mut pipeline = Pipeline::new(OfflineOracle);
    pipeline.state.load_dataset(&sample_csv()).unwrap();
    pipeline.state.set_target("passed").unwrap();
    pipeline.state.toggle_feature("hours").unwrap();
    pipeline.state.next().unwrap();
    pipeline.state.next().unwrap();
    pipeline
        .state
        .select_model(ModelKind::LogisticRegression)
        .unwrap();

    let err = pipeline.run_training().await.unwrap_err();
    assert!(matches!(err, NeuroflowError::Oracle(_)));

    let state = &pipeline.state;
    assert_eq!(state.stage(), Stage::ModelSelect);
    assert!(!state.training_in_progress());
    assert!(state.last_error().unwrap().contains("unreachable"));
    assert_eq!(state.selected_model(), Some(ModelKind::LogisticRegression));
    assert!(state.results().is_none());
}

#[tokio::test]
async fn test_training_precondition_failures() {
    let mut pipeline = Pipeline::new(LocalOracle);
    pipeline.state.load_dataset(&sample_csv()).unwrap();
    pipeline.state.set_target("passed").unwrap();
    pipeline.state.toggle_feature("hours").unwrap();

    // Still at Preprocess, no model selected
    assert!(pipeline.run_training().await.is_err());
    assert!(!pipeline.state.training_in_progress());
    assert_eq!(pipeline.state.stage(), Stage::Preprocess);
}

#[tokio::test]
async fn test_load_dataset_from_path() {
    let path = std::env::temp_dir().join(format!(
        "neuroflow_test_{}.csv",
        std::process::id()
    ));
    tokio::fs::write(&path, sample_csv()).await.unwrap();

    let mut pipeline = Pipeline::new(LocalOracle);
    pipeline.load_dataset_from_path(&path).await.unwrap();
    assert_eq!(pipeline.state.stage(), Stage::Preprocess);
    assert_eq!(pipeline.state.dataset().unwrap().n_rows(), 30);

    tokio::fs::remove_file(&path).await.unwrap();
}

#[tokio::test]
async fn test_missing_file_is_io_error() {
    let mut pipeline = Pipeline::new(LocalOracle);
    let err = pipeline
        .load_dataset_from_path(std::path::Path::new("/nonexistent/data.csv"))
        .await
        .unwrap_err();
    assert!(matches!(err, NeuroflowError::Io(_)));
}

#[tokio::test]
async fn test_reset_after_results() {
    let mut pipeline = Pipeline::new(LocalOracle);
    pipeline.state.load_dataset(&sample_csv()).unwrap();
    pipeline.state.set_target("passed").unwrap();
    pipeline.state.toggle_feature("hours").unwrap();
    pipeline.state.set_scaler(ScalerChoice::Standard);
    pipeline.state.next().unwrap();
    pipeline.state.next().unwrap();
    pipeline
        .state
        .select_model(ModelKind::DecisionTree)
        .unwrap();
    pipeline.run_training().await.unwrap();
    assert_eq!(pipeline.state.stage(), Stage::Results);

    pipeline.state.reset();
    assert_eq!(pipeline.state.stage(), Stage::Upload);
    assert!(pipeline.state.dataset().is_none());
    assert!(pipeline.state.results().is_none());
    assert_eq!(pipeline.state.scaler_choice(), ScalerChoice::None);

    // The session can be rebuilt from scratch after a reset
    pipeline.state.load_dataset(&sample_csv()).unwrap();
    assert_eq!(pipeline.state.stage(), Stage::Preprocess);
}
