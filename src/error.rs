//! Error types for the NeuroFlow pipeline core

use thiserror::Error;

/// Result type alias for NeuroFlow operations
pub type Result<T> = std::result::Result<T, NeuroflowError>;

/// Failure modes of a CSV upload attempt.
///
/// Each variant is fatal to the current attempt; the caller recovers by
/// supplying a new file. Malformed individual rows are not represented here —
/// they are skipped during parsing without failing the attempt.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("CSV input is empty")]
    EmptyInput,

    #[error("CSV must have at least a header and one data row")]
    NoHeaderOrRows,

    #[error("parsed CSV contains no valid data rows")]
    NoValidRows,
}

/// Main error type for the NeuroFlow framework
#[derive(Error, Debug)]
pub enum NeuroflowError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Oracle error: {0}")]
    Oracle(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
