// src/models/metrics.rs
use anyhow::{Context, Result};
use log::{info, warn};
use serde_json::{Map, Value as JsonValue};
use std::path::Path;

use crate::error::PredictionError;
use crate::models::registry::ModelRegistry;

pub const ACCURACY_KEY: &str = "Accuracy";

/// Evaluation metrics per model name, kept in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsTable {
    entries: Map<String, JsonValue>,
}

impl MetricsTable {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read metrics file {}", path.display()))?;
        let value: JsonValue = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse metrics file {}", path.display()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: JsonValue) -> Result<Self> {
        match value {
            JsonValue::Object(entries) => Ok(Self { entries }),
            other => anyhow::bail!(
                "Metrics must be an object keyed by model name, found {}",
                json_type(&other)
            ),
        }
    }

    pub fn as_json(&self) -> JsonValue {
        JsonValue::Object(self.entries.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Accuracy for one entry. Numbers and numeric strings are accepted.
    pub fn accuracy(&self, model_name: &str) -> Option<f64> {
        self.entries.get(model_name).and_then(|record| parse_accuracy(model_name, record))
    }

    /// Highest-accuracy entry. Ties go to the entry that appears first;
    /// entries without a usable Accuracy are skipped.
    pub fn best(&self) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for (name, record) in &self.entries {
            let Some(acc) = parse_accuracy(name, record) else {
                continue;
            };
            if acc.is_nan() {
                continue;
            }
            if best.map_or(true, |(_, best_acc)| acc > best_acc) {
                best = Some((name.as_str(), acc));
            }
        }
        best
    }
}

fn parse_accuracy(name: &str, record: &JsonValue) -> Option<f64> {
    let parsed = match record.get(ACCURACY_KEY) {
        Some(JsonValue::Number(n)) => n.as_f64(),
        Some(JsonValue::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    if parsed.is_none() {
        warn!("Could not parse accuracy for model {}", name);
    }
    parsed
}

fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// Resolves the "best" selector.
///
/// The metrics table decides when it has a usable entry; otherwise the first
/// loaded model is used. The chosen name is not checked against the registry
/// here, so a metrics entry for a model that failed to load surfaces as
/// `ModelNotFound` at lookup time rather than being silently replaced.
pub fn auto_select_model(
    registry: &ModelRegistry,
    metrics: Option<&MetricsTable>,
) -> Result<String, PredictionError> {
    if let Some((name, acc)) = metrics.and_then(|table| table.best()) {
        info!("Auto-selected best model: {} with accuracy {}", name, acc);
        return Ok(name.to_string());
    }

    warn!("Metrics file not found or no valid metrics. Falling back to first model.");
    registry
        .first()
        .map(|entry| entry.name.clone())
        .ok_or(PredictionError::NoModelsAvailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::registry::ModelEntry;
    use serde_json::json;

    fn registry_with(names: &[&str]) -> ModelRegistry {
        let mut registry = ModelRegistry::new();
        for name in names {
            let bytes = json!({
                "estimator": {"type": "logistic_regression", "coefficients": [1.0], "intercept": 0.0}
            })
            .to_string();
            registry.insert(ModelEntry::from_bytes(name.to_string(), bytes.as_bytes()).unwrap());
        }
        registry
    }

    #[test]
    fn test_best_is_strict_maximum() {
        let table = MetricsTable::from_value(json!({
            "Logistic Regression": {"Accuracy": 0.77},
            "Random Forest": {"Accuracy": 0.81, "F1": 0.7},
            "Decision Tree": {"Accuracy": "0.79"}
        }))
        .unwrap();
        assert_eq!(table.best(), Some(("Random Forest", 0.81)));
        assert_eq!(table.accuracy("Decision Tree"), Some(0.79));
    }

    #[test]
    fn test_tie_goes_to_first_entry_in_file_order() {
        let table = MetricsTable::from_value(
            serde_json::from_str(
                r#"{"Zeta": {"Accuracy": 0.9}, "Alpha": {"Accuracy": 0.9}, "Mid": {"Accuracy": 0.5}}"#,
            )
            .unwrap(),
        )
        .unwrap();
        for _ in 0..5 {
            assert_eq!(table.best(), Some(("Zeta", 0.9)));
        }
    }

    #[test]
    fn test_malformed_entries_are_excluded() {
        let table = MetricsTable::from_value(json!({
            "No Accuracy": {"Precision": 0.99},
            "Bad Accuracy": {"Accuracy": "high"},
            "Not A Record": 0.99,
            "Nan Accuracy": {"Accuracy": "NaN"},
            "Good": {"Accuracy": 0.6}
        }))
        .unwrap();
        assert_eq!(table.best(), Some(("Good", 0.6)));
    }

    #[test]
    fn test_auto_select_uses_metrics_then_falls_back() {
        let registry = registry_with(&["Logistic Regression", "Random Forest"]);
        let table = MetricsTable::from_value(json!({
            "Logistic Regression": {"Accuracy": 0.7},
            "Random Forest": {"Accuracy": 0.8}
        }))
        .unwrap();
        assert_eq!(auto_select_model(&registry, Some(&table)).unwrap(), "Random Forest");

        // No metrics at all
        assert_eq!(auto_select_model(&registry, None).unwrap(), "Logistic Regression");

        // Metrics present but nothing usable
        let useless = MetricsTable::from_value(json!({"Random Forest": {}})).unwrap();
        assert_eq!(
            auto_select_model(&registry, Some(&useless)).unwrap(),
            "Logistic Regression"
        );
    }

    #[test]
    fn test_auto_select_on_empty_registry() {
        let registry = ModelRegistry::new();
        assert_eq!(
            auto_select_model(&registry, None),
            Err(PredictionError::NoModelsAvailable)
        );
    }

    #[test]
    fn test_metrics_must_be_an_object() {
        assert!(MetricsTable::from_value(json!([1, 2, 3])).is_err());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_metrics.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(MetricsTable::load(&path).is_err());
        assert!(MetricsTable::load(&dir.path().join("missing.json")).is_err());
    }
}
