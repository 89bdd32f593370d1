//! Staged pipeline state machine
//!
//! [`PipelineState`] owns the dataset and every user selection, and is
//! mutated only through named transition methods, so the legal stage
//! sequence can be tested without any rendering layer. [`Pipeline`] wraps
//! the state together with a [`TrainingOracle`] and adds the two operations
//! that suspend: reading the dataset file and running a training evaluation.

use crate::dataset::{Dataset, ScalerChoice};
use crate::error::{NeuroflowError, Result};
use crate::oracle::{ModelKind, TrainingOracle, TrainingRequest, TrainingResults};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

pub const MIN_SPLIT_RATIO: u8 = 50;
pub const MAX_SPLIT_RATIO: u8 = 90;
pub const SPLIT_RATIO_STEP: u8 = 5;
pub const DEFAULT_SPLIT_RATIO: u8 = 80;

/// The five ordered pipeline stages. No skipping, no re-entry out of
/// sequence; `Results` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Upload,
    Preprocess,
    Split,
    ModelSelect,
    Results,
}

impl Stage {
    /// 1-based position in the stage sequence
    pub fn number(self) -> u8 {
        match self {
            Stage::Upload => 1,
            Stage::Preprocess => 2,
            Stage::Split => 3,
            Stage::ModelSelect => 4,
            Stage::Results => 5,
        }
    }

    fn next(self) -> Option<Stage> {
        match self {
            Stage::Upload => Some(Stage::Preprocess),
            Stage::Preprocess => Some(Stage::Split),
            Stage::Split => Some(Stage::ModelSelect),
            Stage::ModelSelect => Some(Stage::Results),
            Stage::Results => None,
        }
    }

    fn prev(self) -> Option<Stage> {
        match self {
            Stage::Upload => None,
            Stage::Preprocess => Some(Stage::Upload),
            Stage::Split => Some(Stage::Preprocess),
            Stage::ModelSelect => Some(Stage::Split),
            Stage::Results => Some(Stage::ModelSelect),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Upload => "Upload",
            Stage::Preprocess => "Preprocess",
            Stage::Split => "Split",
            Stage::ModelSelect => "ModelSelect",
            Stage::Results => "Results",
        };
        write!(f, "{}", name)
    }
}

/// All mutable session state.
///
/// Created once with stage `Upload` and every optional field empty; `reset`
/// reinitializes it identically. `training_in_progress` is the sole
/// concurrency guard: it rejects re-entrant training requests, there is no
/// queue and no cancellation. Fields are private; every mutation goes
/// through a named transition method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    stage: Stage,
    dataset: Option<Dataset>,
    scaler_choice: ScalerChoice,
    split_ratio: u8,
    selected_model: Option<ModelKind>,
    training_in_progress: bool,
    results: Option<TrainingResults>,
    last_error: Option<String>,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            stage: Stage::Upload,
            dataset: None,
            scaler_choice: ScalerChoice::default(),
            split_ratio: DEFAULT_SPLIT_RATIO,
            selected_model: None,
            training_in_progress: false,
            results: None,
            last_error: None,
        }
    }
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn scaler_choice(&self) -> ScalerChoice {
        self.scaler_choice
    }

    pub fn split_ratio(&self) -> u8 {
        self.split_ratio
    }

    pub fn selected_model(&self) -> Option<ModelKind> {
        self.selected_model
    }

    pub fn training_in_progress(&self) -> bool {
        self.training_in_progress
    }

    pub fn results(&self) -> Option<&TrainingResults> {
        self.results.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Parse CSV text into a fresh dataset and advance to `Preprocess`.
    ///
    /// Only legal at `Upload`. On parse failure the stage is unchanged and
    /// the error is returned to the caller; retrying with different text is
    /// always possible.
    pub fn load_dataset(&mut self, text: &str) -> Result<()> {
        if self.stage != Stage::Upload {
            return Err(NeuroflowError::Validation(format!(
                "a dataset can only be loaded at the Upload stage (currently at {})",
                self.stage
            )));
        }

        let dataset = Dataset::from_csv(text)?;
        info!(
            rows = dataset.n_rows(),
            columns = dataset.column_names().len(),
            "dataset loaded"
        );

        self.dataset = Some(dataset);
        self.last_error = None;
        self.advance_to(Stage::Preprocess);
        Ok(())
    }

    /// Advance one stage. Rejected at `Preprocess` until a target and at
    /// least one feature are selected; the rejection sets `last_error` and
    /// leaves the stage unchanged. Not offered at `ModelSelect`: `Results`
    /// is entered only through a successful training run.
    pub fn next(&mut self) -> Result<()> {
        let Some(next) = self.stage.next() else {
            return Ok(());
        };
        if next == Stage::Results {
            return Ok(());
        }

        if self.stage == Stage::Preprocess {
            let roles_valid = self
                .dataset
                .as_ref()
                .map(Dataset::roles_valid)
                .unwrap_or(false);
            if !roles_valid {
                let message =
                    "select a target column and at least one feature column".to_string();
                self.last_error = Some(message.clone());
                return Err(NeuroflowError::Validation(message));
            }
        }

        self.last_error = None;
        self.advance_to(next);
        Ok(())
    }

    /// Step one stage back, clearing any validation message. No effect on
    /// the dataset or selections. No-op at `Upload` and at `Results`.
    pub fn back(&mut self) {
        if self.stage == Stage::Results {
            return;
        }
        if let Some(prev) = self.stage.prev() {
            self.last_error = None;
            self.advance_to(prev);
        }
    }

    /// Designate the target column. Removes it from the feature set, so a
    /// column is never simultaneously target and feature.
    pub fn set_target(&mut self, column: &str) -> Result<()> {
        self.dataset_mut()?.set_target(column)
    }

    /// Add or remove a feature column; toggling the current target is a no-op.
    pub fn toggle_feature(&mut self, column: &str) -> Result<()> {
        self.dataset_mut()?.toggle_feature(column)
    }

    /// Update the scaler choice. An actual change triggers a derived-state
    /// refresh of the processed rows.
    pub fn set_scaler(&mut self, choice: ScalerChoice) {
        if self.scaler_choice == choice {
            return;
        }
        self.scaler_choice = choice;
        self.refresh_processed();
    }

    /// Update the train split percentage, clamped to [50, 90] and snapped to
    /// the nearest multiple of 5.
    pub fn set_split_ratio(&mut self, ratio: u8) {
        let clamped = ratio.clamp(MIN_SPLIT_RATIO, MAX_SPLIT_RATIO) as u32;
        let step = SPLIT_RATIO_STEP as u32;
        self.split_ratio = ((clamped + step / 2) / step * step) as u8;
    }

    /// Choose the model to train. Valid only at `ModelSelect`.
    pub fn select_model(&mut self, model: ModelKind) -> Result<()> {
        if self.stage != Stage::ModelSelect {
            return Err(NeuroflowError::Validation(format!(
                "a model can only be selected at the ModelSelect stage (currently at {})",
                self.stage
            )));
        }
        self.selected_model = Some(model);
        Ok(())
    }

    /// Mark a training run as started after checking every precondition.
    ///
    /// A request while one is outstanding is rejected without touching any
    /// state. Precondition failures do not set `last_error`; only the
    /// eventual [`PipelineState::training_failed`] does.
    pub fn begin_training(&mut self) -> Result<()> {
        if self.training_in_progress {
            return Err(NeuroflowError::Validation(
                "a training run is already in progress".to_string(),
            ));
        }
        if self.stage != Stage::ModelSelect {
            return Err(NeuroflowError::Validation(format!(
                "training can only start from the ModelSelect stage (currently at {})",
                self.stage
            )));
        }
        // Builds and discards the request to validate dataset, roles, and
        // model presence.
        self.training_request()?;

        self.training_in_progress = true;
        info!(
            model = %self.selected_model.map(|m| m.to_string()).unwrap_or_default(),
            split_ratio = self.split_ratio,
            "training started"
        );
        Ok(())
    }

    /// Completion mutation for a successful oracle call: store the results,
    /// clear the busy flag, advance to `Results`.
    pub fn training_succeeded(&mut self, results: TrainingResults) {
        info!(accuracy = results.accuracy, "training finished");
        self.results = Some(results);
        self.training_in_progress = false;
        self.last_error = None;
        self.advance_to(Stage::Results);
    }

    /// Completion mutation for a failed oracle call: clear the busy flag and
    /// record the message. The stage and all selections are preserved so the
    /// run can be retried.
    pub fn training_failed(&mut self, message: String) {
        info!(error = %message, "training failed");
        self.training_in_progress = false;
        self.last_error = Some(message);
    }

    /// Return to the initial state, discarding dataset, selections, and
    /// results. Does not retract an in-flight oracle call.
    pub fn reset(&mut self) {
        *self = PipelineState::new();
    }

    /// Snapshot of everything an oracle needs for the current configuration
    pub fn training_request(&self) -> Result<TrainingRequest> {
        let dataset = self
            .dataset
            .as_ref()
            .ok_or_else(|| NeuroflowError::Validation("no dataset loaded".to_string()))?;
        let target_column = dataset.target_column().map(str::to_string).ok_or_else(|| {
            NeuroflowError::Validation("no target column selected".to_string())
        })?;
        if dataset.feature_columns().is_empty() {
            return Err(NeuroflowError::Validation(
                "no feature columns selected".to_string(),
            ));
        }
        let model = self.selected_model.ok_or_else(|| {
            NeuroflowError::Validation("no model selected".to_string())
        })?;

        Ok(TrainingRequest {
            rows: dataset.processed_rows().to_vec(),
            column_stats: dataset.stats().to_vec(),
            target_column,
            feature_columns: dataset.ordered_features(),
            scaler_choice: self.scaler_choice,
            split_ratio: self.split_ratio,
            model,
        })
    }

    fn dataset_mut(&mut self) -> Result<&mut Dataset> {
        self.dataset
            .as_mut()
            .ok_or_else(|| NeuroflowError::Validation("no dataset loaded".to_string()))
    }

    fn advance_to(&mut self, stage: Stage) {
        debug!(from = %self.stage, to = %stage, "stage transition");
        self.stage = stage;
        self.refresh_processed();
    }

    /// Derived-state refresh: rebuild processed rows from the raw rows.
    /// Runs on every scaler change and every stage change at or after
    /// `Preprocess` while a dataset is present.
    fn refresh_processed(&mut self) {
        if self.stage < Stage::Preprocess {
            return;
        }
        if let Some(dataset) = self.dataset.as_mut() {
            dataset.recompute_processed(self.scaler_choice);
        }
    }
}

/// The state machine plus its training oracle
#[derive(Debug)]
pub struct Pipeline<O> {
    pub state: PipelineState,
    oracle: O,
}

impl<O: TrainingOracle> Pipeline<O> {
    pub fn new(oracle: O) -> Self {
        Self {
            state: PipelineState::new(),
            oracle,
        }
    }

    /// Read a CSV file and load it as the session dataset
    pub async fn load_dataset_from_path(&mut self, path: &Path) -> Result<()> {
        let text = tokio::fs::read_to_string(path).await?;
        self.state.load_dataset(&text)
    }

    /// Run one training evaluation against the oracle.
    ///
    /// The request is snapshotted before the call, the busy flag guards
    /// re-entry, and the completion mutation (success or failure) is applied
    /// in one step once the oracle resolves.
    pub async fn run_training(&mut self) -> Result<()> {
        let request = self.state.training_request()?;
        self.state.begin_training()?;

        match self.oracle.evaluate(&request).await {
            Ok(results) => {
                self.state.training_succeeded(results);
                Ok(())
            }
            Err(err) => {
                self.state.training_failed(err.to_string());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::LocalOracle;

    // Labels interleaved so any ordered train/test split sees both classes
    const CSV: &str = "age,height,label\n1,100,no\n6,150,yes\n2,110,no\n7,160,yes\n\
                       3,120,no\n8,170,yes\n4,130,no\n9,180,yes\n5,140,no\n10,190,yes\n";

    fn configured_state() -> PipelineState {
        let mut state = PipelineState::new();
        state.load_dataset(CSV).unwrap();
        state.set_target("label").unwrap();
        state.toggle_feature("age").unwrap();
        state.toggle_feature("height").unwrap();
        state
    }

    #[test]
    fn test_initial_state() {
        let state = PipelineState::new();
        assert_eq!(state.stage, Stage::Upload);
        assert!(state.dataset.is_none());
        assert_eq!(state.scaler_choice, ScalerChoice::None);
        assert_eq!(state.split_ratio, DEFAULT_SPLIT_RATIO);
        assert!(!state.training_in_progress);
    }

    #[test]
    fn test_stage_ordering() {
        assert!(Stage::Upload < Stage::Preprocess);
        assert!(Stage::ModelSelect < Stage::Results);
        assert_eq!(Stage::Upload.number(), 1);
        assert_eq!(Stage::Results.number(), 5);
        assert_eq!(Stage::Results.next(), None);
        assert_eq!(Stage::Upload.prev(), None);
    }

    #[test]
    fn test_load_advances_to_preprocess() {
        let mut state = PipelineState::new();
        state.load_dataset(CSV).unwrap();
        assert_eq!(state.stage, Stage::Preprocess);
        assert!(state.dataset.is_some());
    }

    #[test]
    fn test_load_outside_upload_rejected() {
        let mut state = configured_state();
        let err = state.load_dataset(CSV).unwrap_err();
        assert!(matches!(err, NeuroflowError::Validation(_)));
    }

    #[test]
    fn test_load_failure_keeps_stage() {
        let mut state = PipelineState::new();
        assert!(state.load_dataset("").is_err());
        assert_eq!(state.stage, Stage::Upload);
        assert!(state.dataset.is_none());
    }

    #[test]
    fn test_next_blocked_without_roles_then_advances() {
        let mut state = PipelineState::new();
        state.load_dataset(CSV).unwrap();

        assert!(state.next().is_err());
        assert_eq!(state.stage, Stage::Preprocess);
        assert!(state.last_error.is_some());

        state.set_target("label").unwrap();
        state.toggle_feature("age").unwrap();
        state.next().unwrap();
        assert_eq!(state.stage, Stage::Split);
        assert!(state.last_error.is_none());
    }

    #[test]
    fn test_back_is_bounded() {
        let mut state = configured_state();
        state.back();
        assert_eq!(state.stage, Stage::Upload);
        // Upload has no previous stage
        state.back();
        assert_eq!(state.stage, Stage::Upload);
    }

    #[test]
    fn test_next_not_offered_at_model_select() {
        let mut state = configured_state();
        state.next().unwrap();
        state.next().unwrap();
        assert_eq!(state.stage, Stage::ModelSelect);

        // Results is entered only through training_succeeded
        state.next().unwrap();
        assert_eq!(state.stage, Stage::ModelSelect);
        assert!(state.results.is_none());

        state.select_model(ModelKind::DecisionTree).unwrap();
        state.begin_training().unwrap();
        state.training_succeeded(dummy_results());
        assert_eq!(state.stage, Stage::Results);
        assert!(state.results.is_some());
    }

    #[test]
    fn test_back_not_offered_at_results() {
        let mut state = configured_state();
        state.next().unwrap();
        state.next().unwrap();
        state.select_model(ModelKind::DecisionTree).unwrap();
        state.begin_training().unwrap();
        state.training_succeeded(dummy_results());

        assert_eq!(state.stage, Stage::Results);
        state.back();
        assert_eq!(state.stage, Stage::Results);
    }

    #[test]
    fn test_scaler_change_recomputes_processed() {
        let mut state = configured_state();
        state.set_scaler(ScalerChoice::MinMax);

        let dataset = state.dataset.as_ref().unwrap();
        let scaled = dataset.processed_rows()[0]["age"].as_numeric().unwrap();
        assert_eq!(scaled, 0.0);
        // Raw rows are untouched
        assert_eq!(dataset.raw_rows()[0]["age"].as_numeric().unwrap(), 1.0);
    }

    #[test]
    fn test_target_never_scaled() {
        let mut state = PipelineState::new();
        state.load_dataset("a,y\n1,10\n2,20\n3,30\n").unwrap();
        state.set_target("y").unwrap();
        state.toggle_feature("a").unwrap();
        state.set_scaler(ScalerChoice::MinMax);

        let dataset = state.dataset.as_ref().unwrap();
        assert_eq!(dataset.processed_rows()[0]["y"].as_numeric().unwrap(), 10.0);
        assert_eq!(dataset.processed_rows()[0]["a"].as_numeric().unwrap(), 0.0);
    }

    #[test]
    fn test_split_ratio_clamps_and_snaps() {
        let mut state = PipelineState::new();

        state.set_split_ratio(42);
        assert_eq!(state.split_ratio, 50);
        state.set_split_ratio(97);
        assert_eq!(state.split_ratio, 90);
        state.set_split_ratio(63);
        assert_eq!(state.split_ratio, 65);
        state.set_split_ratio(62);
        assert_eq!(state.split_ratio, 60);
    }

    #[test]
    fn test_select_model_only_at_model_select() {
        let mut state = configured_state();
        assert!(state.select_model(ModelKind::DecisionTree).is_err());

        state.next().unwrap();
        state.next().unwrap();
        assert_eq!(state.stage, Stage::ModelSelect);
        state.select_model(ModelKind::DecisionTree).unwrap();
        assert_eq!(state.selected_model, Some(ModelKind::DecisionTree));
    }

    #[test]
    fn test_begin_training_preconditions() {
        let mut state = configured_state();
        // Still at Preprocess
        assert!(state.begin_training().is_err());

        state.next().unwrap();
        state.next().unwrap();
        // No model selected yet
        assert!(state.begin_training().is_err());

        state.select_model(ModelKind::LogisticRegression).unwrap();
        state.begin_training().unwrap();
        assert!(state.training_in_progress);
    }

    #[test]
    fn test_second_training_request_rejected() {
        let mut state = configured_state();
        state.next().unwrap();
        state.next().unwrap();
        state.select_model(ModelKind::DecisionTree).unwrap();
        state.begin_training().unwrap();

        let before = state.clone();
        assert!(state.begin_training().is_err());
        assert_eq!(state.stage, before.stage);
        assert!(state.training_in_progress);
        assert_eq!(state.last_error, before.last_error);
    }

    #[test]
    fn test_training_failure_preserves_selections() {
        let mut state = configured_state();
        state.next().unwrap();
        state.next().unwrap();
        state.select_model(ModelKind::DecisionTree).unwrap();
        state.begin_training().unwrap();
        state.training_failed("service unavailable".to_string());

        assert_eq!(state.stage, Stage::ModelSelect);
        assert!(!state.training_in_progress);
        assert_eq!(state.last_error.as_deref(), Some("service unavailable"));
        assert_eq!(state.selected_model, Some(ModelKind::DecisionTree));
        assert!(state.dataset.is_some());
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut state = configured_state();
        state.set_scaler(ScalerChoice::Standard);
        state.set_split_ratio(60);
        state.reset();

        assert_eq!(state.stage, Stage::Upload);
        assert!(state.dataset.is_none());
        assert_eq!(state.scaler_choice, ScalerChoice::None);
        assert_eq!(state.split_ratio, DEFAULT_SPLIT_RATIO);
        assert!(state.results.is_none());
    }

    #[tokio::test]
    async fn test_pipeline_end_to_end_with_local_oracle() {
        let mut pipeline = Pipeline::new(LocalOracle);
        pipeline.state.load_dataset(CSV).unwrap();
        pipeline.state.set_target("label").unwrap();
        pipeline.state.toggle_feature("age").unwrap();
        pipeline.state.toggle_feature("height").unwrap();
        pipeline.state.set_scaler(ScalerChoice::Standard);
        pipeline.state.next().unwrap();
        pipeline.state.set_split_ratio(50);
        pipeline.state.next().unwrap();
        pipeline
            .state
            .select_model(ModelKind::LogisticRegression)
            .unwrap();

        pipeline.run_training().await.unwrap();

        let state = &pipeline.state;
        assert_eq!(state.stage, Stage::Results);
        assert!(!state.training_in_progress);
        let results = state.results.as_ref().unwrap();
        assert!(results.accuracy > 0.5);
        assert_eq!(results.feature_importance.len(), 2);
    }

    fn dummy_results() -> TrainingResults {
        TrainingResults {
            accuracy: 0.9,
            precision: 0.9,
            recall: 0.9,
            f1_score: 0.9,
            confusion_matrix: [[4, 1], [0, 5]],
            feature_importance: Vec::new(),
            insights: String::new(),
        }
    }
}
