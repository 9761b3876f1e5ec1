// src/prediction/context.rs
use anyhow::Result;
use log::{info, warn};

use crate::error::PredictionError;
use crate::models::metrics::{auto_select_model, MetricsTable};
use crate::models::preprocessing::Preprocessor;
use crate::models::registry::{ModelEntry, ModelRegistry};
use crate::utils::config::PredictorConfig;

/// Selector value that asks for the highest-accuracy model.
pub const BEST_MODEL_SELECTOR: &str = "best";

/// Everything a prediction needs, built once at startup and only read
/// afterwards. Share it behind an `Arc`; no locking is needed.
#[derive(Debug, Clone, Default)]
pub struct PredictionContext {
    registry: ModelRegistry,
    preprocessor: Option<Preprocessor>,
    metrics: Option<MetricsTable>,
}

impl PredictionContext {
    pub fn new(
        registry: ModelRegistry,
        preprocessor: Option<Preprocessor>,
        metrics: Option<MetricsTable>,
    ) -> Self {
        Self {
            registry,
            preprocessor,
            metrics,
        }
    }

    /// Loads models, preprocessor and metrics from the configured directory.
    ///
    /// Only an unreadable models directory is an error. A missing or broken
    /// preprocessor or metrics file degrades the context instead.
    pub fn load(config: &PredictorConfig) -> Result<Self> {
        let registry =
            ModelRegistry::load_from_dir(&config.models_dir, &config.reserved_files())?;

        let preprocessor = match Preprocessor::load(&config.preprocessor_path()) {
            Ok(p) => {
                info!(
                    "Loaded fitted preprocessor successfully ({} steps).",
                    p.steps.len()
                );
                Some(p)
            }
            Err(e) => {
                warn!(
                    "Fitted preprocessor not available ({:#}). Standalone models cannot be scored.",
                    e
                );
                None
            }
        };

        let metrics = match MetricsTable::load(&config.metrics_path()) {
            Ok(table) => {
                info!("Loaded metrics for {} models.", table.len());
                Some(table)
            }
            Err(e) => {
                warn!(
                    "Metrics unreadable ({:#}). Auto-selection will fall back to the first model.",
                    e
                );
                None
            }
        };

        Ok(Self::new(registry, preprocessor, metrics))
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn preprocessor(&self) -> Option<&Preprocessor> {
        self.preprocessor.as_ref()
    }

    pub fn metrics(&self) -> Result<&MetricsTable, PredictionError> {
        self.metrics.as_ref().ok_or(PredictionError::MetricsUnavailable)
    }

    /// Resolves a model selector: an exact model name or `"best"`.
    pub fn resolve_model(&self, selector: &str) -> Result<&ModelEntry, PredictionError> {
        let name = if selector == BEST_MODEL_SELECTOR {
            auto_select_model(&self.registry, self.metrics.as_ref())?
        } else {
            selector.to_string()
        };

        self.registry.get(&name).ok_or_else(|| {
            warn!("Selected model '{}' not found.", name);
            PredictionError::ModelNotFound(name)
        })
    }

    /// `"best"` followed by every loaded model name.
    pub fn available_models(&self) -> Vec<String> {
        std::iter::once(BEST_MODEL_SELECTOR)
            .chain(self.registry.names())
            .map(str::to_string)
            .collect()
    }

    /// Per-model importances as stored in the artifacts (or linear
    /// coefficients). Models exposing neither are left out.
    pub fn feature_importances(&self) -> Vec<(String, Vec<f64>)> {
        self.registry
            .entries()
            .iter()
            .filter_map(|entry| {
                entry
                    .artifact
                    .estimator
                    .feature_importances()
                    .map(|values| (entry.name.clone(), values.to_vec()))
            })
            .collect()
    }
}
