//! Core types for GK (Garis Kemiskinan) poverty-line prediction
//!
//! Shared by the offline pipeline and the inference service so that both
//! sides agree on the encoding contract and the persisted artifact format.
//!
//! Modules:
//! - `observation`: Long-form observations and strict category label parsing
//! - `features`: Feature encoder, encoded tables and the canonical schema
//! - `model`: Persisted regression models (linear and random forest)
//! - `metrics`: Regression metrics and the per-variant metrics report
//! - `serialization`: Canonical JSON and BLAKE3 digests for artifacts
//! - `layout`: On-disk artifact layout shared by trainer and service

pub mod errors;
pub mod features;
pub mod layout;
pub mod metrics;
pub mod model;
pub mod observation;
pub mod serialization;

pub use errors::{CoreError, Result};
pub use features::{
    encode, EncodedTable, FeatureEncoder, FeatureSchema, ImputationSummary, CANONICAL_FEATURES,
    PERIOD_SENTINEL, TARGET_COLUMN,
};
pub use layout::ArtifactLayout;
pub use metrics::{BestModel, FitMetrics, MetricsReport, RegressionMetrics};
pub use model::{
    ForestModel, LinearModel, ModelArtifact, ModelKind, ModelMetadata, ModelVariant,
    RegressionTree, TreeNode,
};
pub use observation::{parse_label, CategoryLabel, Observation};

/// Crate version string recorded in artifact metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
