// src/models/mod.rs
//! Trained model artifacts, the shared preprocessor, and the registry that
//! holds them for the lifetime of the process.

pub mod estimator;
pub mod metrics;
pub mod preprocessing;
pub mod registry;

pub use estimator::{Estimator, ModelArtifact, RawPrediction};
pub use metrics::{auto_select_model, MetricsTable};
pub use preprocessing::{Preprocessor, TransformStep};
pub use registry::{model_name_from_file, ModelEntry, ModelKind, ModelRegistry};
