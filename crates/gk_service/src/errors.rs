//! Error types for the inference service

use gk_core::CoreError;
use thiserror::Error;

/// Errors raised while configuring, loading or serving a model
#[derive(Error, Debug)]
pub enum ServiceError {
    /// No model is being served
    #[error("{0}")]
    Unavailable(String),

    /// Required feature keys absent from the request, in schema order
    #[error("Missing required features: {}", .0.join(", "))]
    MissingFeatures(Vec<String>),

    /// A feature value is not a finite number
    #[error("Invalid value for feature {name:?}: {reason}")]
    InvalidFeature { name: String, reason: String },

    /// Malformed request body
    #[error("{0}")]
    InvalidRequest(String),

    /// The model failed to produce a prediction
    #[error("Prediction failed: {0}")]
    Prediction(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Artifact load or validation failure
    #[error(transparent)]
    Artifact(#[from] CoreError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    /// Whether the caller sent something the service cannot accept
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServiceError::MissingFeatures(_)
                | ServiceError::InvalidFeature { .. }
                | ServiceError::InvalidRequest(_)
        )
    }
}

/// Result type for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;
