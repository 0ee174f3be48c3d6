//! Error types for the GK core crate

use thiserror::Error;

/// Errors raised while parsing, encoding, scoring or persisting artifacts
#[derive(Error, Debug)]
pub enum CoreError {
    /// A wide-table column header did not match the category label format
    #[error("Malformed category label: {label:?}")]
    MalformedLabel { label: String },

    /// A value cell could not be parsed as a number
    #[error("Invalid value {value:?} at row {row}, column {column:?}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    /// Missing values survived mean imputation
    #[error("Missing values remain in column {column:?} after imputation")]
    UnresolvedMissing { column: String },

    /// A category level was not seen when the encoder was fitted
    #[error("Unknown {field} level {level:?} (not present in fitting data)")]
    UnknownCategory { field: &'static str, level: String },

    /// Feature names differ from the expected schema
    #[error("Feature schema mismatch: expected {expected:?}, got {actual:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// Feature vector length differs from the model's feature count
    #[error("Feature count mismatch: expected {expected}, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    /// Model produced NaN or infinity
    #[error("Model produced a non-finite prediction: {0}")]
    NonFinitePrediction(f64),

    /// Persisted hash does not match the artifact content
    #[error("Model hash mismatch: expected {expected}, computed {actual}")]
    HashMismatch { expected: String, actual: String },

    /// Input table has no usable rows
    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    /// Invalid model parameters
    #[error("Invalid model parameters: {0}")]
    InvalidParameters(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
