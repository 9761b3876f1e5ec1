// src/prediction/mod.rs
//! Request-level prediction: model resolution, inference and the
//! prediction log.

pub mod context;
pub mod history;
pub mod predictor;

pub use context::{PredictionContext, BEST_MODEL_SELECTOR};
pub use history::{PredictionLog, PredictionLogEntry, PredictionStats};
pub use predictor::{
    confidence_message, predict, predict_and_record, predict_from_form, predict_observation,
    DiagnosisLabel, PredictionResult,
};
