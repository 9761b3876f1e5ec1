// src/error.rs
use serde::Serialize;
use serde_json::{json, Value as JsonValue};

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn missing(field: &str) -> Self {
        Self {
            field: field.to_string(),
            message: "field is required".to_string(),
        }
    }

    pub fn invalid(field: &str, message: String) -> Self {
        Self {
            field: field.to_string(),
            message,
        }
    }
}

/// Request-level failures. Each one rejects the request; none of them should
/// take the process down.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionError {
    Validation(Vec<FieldError>),
    ModelNotFound(String),
    NoModelsAvailable,
    PreprocessorUnavailable(String),
    FeatureShapeMismatch {
        stage: String,
        expected: usize,
        actual: usize,
    },
    MalformedModel(String),
    MetricsUnavailable,
}

impl std::fmt::Display for PredictionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PredictionError::Validation(errors) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                write!(f, "Invalid input for {}.", fields.join(", "))
            }
            PredictionError::ModelNotFound(name) => {
                write!(f, "Selected model '{}' not found.", name)
            }
            PredictionError::NoModelsAvailable => {
                write!(f, "No models available for prediction.")
            }
            PredictionError::PreprocessorUnavailable(name) => write!(
                f,
                "Model '{}' requires the fitted preprocessor, which is not loaded.",
                name
            ),
            PredictionError::FeatureShapeMismatch {
                stage,
                expected,
                actual,
            } => write!(
                f,
                "{} expects {} features but received {}.",
                stage, expected, actual
            ),
            PredictionError::MalformedModel(reason) => {
                write!(f, "Model artifact is malformed: {}.", reason)
            }
            PredictionError::MetricsUnavailable => write!(f, "Metrics file not found."),
        }
    }
}

impl std::error::Error for PredictionError {}

impl PredictionError {
    /// Stable machine-readable kind for the serving layer.
    pub fn kind(&self) -> &'static str {
        match self {
            PredictionError::Validation(_) => "validation_error",
            PredictionError::ModelNotFound(_) => "model_not_found",
            PredictionError::NoModelsAvailable => "no_models_available",
            PredictionError::PreprocessorUnavailable(_) => "preprocessor_unavailable",
            PredictionError::FeatureShapeMismatch { .. } => "feature_shape_mismatch",
            PredictionError::MalformedModel(_) => "malformed_model",
            PredictionError::MetricsUnavailable => "metrics_unavailable",
        }
    }

    /// Structured error body: `{"error": ..., "kind": ..., "fields": [...]}`.
    pub fn to_response(&self) -> JsonValue {
        let mut body = json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });
        if let PredictionError::Validation(errors) = self {
            body["fields"] = json!(errors);
        }
        body
    }
}
