//! NeuroFlow AutoML - Staged pipeline core
//!
//! This crate implements the dataset ingestion/transform pipeline and the
//! staged state machine behind a guided AutoML session:
//! - CSV parsing with quote-aware splitting and numeric inference
//! - Per-column type inference and descriptive statistics
//! - Optional MinMax/Standard feature scaling
//! - A five-stage state machine (Upload through Results) mutated only
//!   through named transitions
//! - A pluggable Training Oracle boundary with a deterministic local
//!   estimator and a remote HTTP client
//!
//! # Modules
//!
//! - [`dataset`] - Data model, CSV parser, statistics, scaling
//! - [`pipeline`] - Stage sequence and session state
//! - [`oracle`] - Training oracle trait and implementations
//! - [`error`] - Crate-wide error taxonomy

pub mod error;

pub mod dataset;
pub mod oracle;
pub mod pipeline;

pub use error::{NeuroflowError, ParseError, Result};

/// Common imports for working with the pipeline
pub mod prelude {
    pub use crate::dataset::{
        apply_scaling, calculate_stats, parse, CellValue, ColumnStats, ColumnType, Dataset,
        Row, ScalerChoice,
    };
    pub use crate::error::{NeuroflowError, ParseError, Result};
    pub use crate::oracle::{
        LocalOracle, ModelKind, OracleConfig, RemoteOracle, TrainingOracle, TrainingRequest,
        TrainingResults,
    };
    pub use crate::pipeline::{Pipeline, PipelineState, Stage};
}
