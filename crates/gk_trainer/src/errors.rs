use gk_core::CoreError;
use thiserror::Error;

/// Errors returned by the offline pipeline.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("first column must be \"provinsi\", found {found:?}")]
    MissingIdColumn { found: Option<String> },

    #[error("need at least {needed} rows to split, got {actual}")]
    InsufficientRows { needed: usize, actual: usize },

    #[error("training error: {0}")]
    Training(String),

    #[error("evaluation error: {0}")]
    Evaluation(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TrainerError>;
