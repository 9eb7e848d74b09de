//! Error types for textclass

use thiserror::Error;

/// Result type alias for textclass operations
pub type Result<T> = std::result::Result<T, ClassifierError>;

/// Main error type
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// A row's shape or field types do not match the declared schema
    #[error("Schema mismatch{}: {reason}", row_suffix(.row))]
    SchemaMismatch { row: Option<usize>, reason: String },

    #[error("Training error in stage '{stage}': {reason}")]
    TrainingError { stage: String, reason: String },

    #[error("Convergence failed after {iterations} iterations")]
    ConvergenceError { iterations: usize },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A categorical label value has no key in the fitted mapping
    #[error("Unknown label: {0}")]
    UnknownLabel(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

fn row_suffix(row: &Option<usize>) -> String {
    match row {
        Some(r) => format!(" at row {}", r),
        None => String::new(),
    }
}

impl ClassifierError {
    /// Schema mismatch tied to a specific row
    pub fn schema_at(row: usize, reason: impl Into<String>) -> Self {
        ClassifierError::SchemaMismatch {
            row: Some(row),
            reason: reason.into(),
        }
    }

    /// Schema mismatch with no row context
    pub fn schema(reason: impl Into<String>) -> Self {
        ClassifierError::SchemaMismatch {
            row: None,
            reason: reason.into(),
        }
    }

    /// Training failure attributed to a pipeline stage
    pub fn training(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        ClassifierError::TrainingError {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is fatal for a whole run (as opposed to a single row)
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ClassifierError::UnknownLabel(_))
    }
}

impl From<csv::Error> for ClassifierError {
    fn from(err: csv::Error) -> Self {
        let row = err.position().map(|p| p.line() as usize);
        match err.into_kind() {
            csv::ErrorKind::Io(e) => ClassifierError::IoError(e),
            csv::ErrorKind::UnequalLengths { expected_len, len, .. } => {
                ClassifierError::SchemaMismatch {
                    row,
                    reason: format!("expected {} columns, found {}", expected_len, len),
                }
            }
            csv::ErrorKind::Utf8 { err, .. } => ClassifierError::SchemaMismatch {
                row,
                reason: format!("invalid UTF-8: {}", err),
            },
            other => ClassifierError::SchemaMismatch {
                row,
                reason: format!("{:?}", other),
            },
        }
    }
}

impl From<bincode::Error> for ClassifierError {
    fn from(err: bincode::Error) -> Self {
        ClassifierError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for ClassifierError {
    fn from(err: serde_json::Error) -> Self {
        ClassifierError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ClassifierError {
    fn from(err: ndarray::ShapeError) -> Self {
        ClassifierError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
