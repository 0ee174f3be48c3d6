//! GK inference service
//!
//! Serves one immutable GK model over HTTP. The model and its metrics are
//! loaded once at start-up; a failed load leaves the process running in an
//! unavailable state.

pub mod config;
pub mod errors;
pub mod server;
pub mod service;

pub use config::{ServiceConfig, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
pub use errors::{Result, ServiceError};
pub use server::{build_router, start_server};
pub use service::{HealthStatus, LoadedModel, ModelInfo, PredictionService};
