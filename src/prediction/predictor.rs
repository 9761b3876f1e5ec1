// src/prediction/predictor.rs
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::PredictionError;
use crate::features::{encode, EncodedFeatureVector, RawObservation};
use crate::models::preprocessing::{apply_steps, Preprocessor};
use crate::models::registry::{ModelEntry, ModelKind};
use crate::prediction::context::{PredictionContext, BEST_MODEL_SELECTOR};
use crate::prediction::history::PredictionLog;

/// Form field carrying the model selector.
pub const MODEL_FIELD: &str = "model";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosisLabel {
    #[serde(rename = "Diabetic")]
    Diabetic,
    #[serde(rename = "Not Diabetic")]
    NotDiabetic,
}

impl DiagnosisLabel {
    /// Class id 1 is diabetic, anything else is not.
    pub fn from_class(class: u8) -> Self {
        if class == 1 {
            DiagnosisLabel::Diabetic
        } else {
            DiagnosisLabel::NotDiabetic
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosisLabel::Diabetic => "Diabetic",
            DiagnosisLabel::NotDiabetic => "Not Diabetic",
        }
    }
}

/// Outcome of one prediction.
///
/// `label` comes from the model's class output and `probability` from its
/// positive-class score. They are independent: near the decision boundary a
/// model may label "Not Diabetic" with a probability at or above 0.5.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    #[serde(rename = "result")]
    pub label: DiagnosisLabel,
    pub probability: Option<f64>,
    pub model_used: String,
    pub confidence_message: String,
}

pub fn confidence_message(probability: Option<f64>) -> String {
    match probability {
        Some(p) => format!("Confidence: {:.2}%", p * 100.0),
        None => "No Probability Available".to_string(),
    }
}

/// Scores an encoded vector with one model.
///
/// Pipeline models run their embedded preprocessing; standalone models need
/// the shared preprocessor and fail without it.
pub fn predict(
    vector: &EncodedFeatureVector,
    entry: &ModelEntry,
    preprocessor: Option<&Preprocessor>,
) -> Result<PredictionResult, PredictionError> {
    let input = vector.to_array();
    let model_input = match entry.kind {
        ModelKind::Pipeline => {
            let steps = entry.artifact.preprocessing.as_deref().unwrap_or_default();
            apply_steps(steps, input)?
        }
        ModelKind::Standalone => {
            let preprocessor = preprocessor
                .ok_or_else(|| PredictionError::PreprocessorUnavailable(entry.name.clone()))?;
            preprocessor.transform(input)?
        }
    };

    let raw = entry.artifact.estimator.predict(&model_input)?;
    // The capability flag is authoritative for whether a score is reported
    let probability = if entry.supports_probability {
        raw.probability
    } else {
        None
    };

    let label = DiagnosisLabel::from_class(raw.class);
    debug!(
        "Model '{}' returned class {} (probability {:?})",
        entry.name, raw.class, probability
    );

    Ok(PredictionResult {
        label,
        probability,
        model_used: entry.name.clone(),
        confidence_message: confidence_message(probability),
    })
}

/// Encodes, resolves the selector and predicts.
pub fn predict_observation(
    ctx: &PredictionContext,
    observation: &RawObservation,
    selector: &str,
) -> Result<PredictionResult, PredictionError> {
    let vector = encode(observation);
    let entry = ctx.resolve_model(selector)?;
    let result = predict(&vector, entry, ctx.preprocessor())?;
    info!(
        "Prediction with '{}': {} ({})",
        result.model_used,
        result.label.as_str(),
        result.confidence_message
    );
    Ok(result)
}

/// Entry point for the serving layer: raw form strings in, result out.
/// A missing `model` field means `"best"`.
pub fn predict_from_form(
    ctx: &PredictionContext,
    form: &HashMap<String, String>,
) -> Result<PredictionResult, PredictionError> {
    let observation = RawObservation::from_form(form)?;
    let selector = form
        .get(MODEL_FIELD)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or(BEST_MODEL_SELECTOR);
    predict_observation(ctx, &observation, selector)
}

/// [`predict_from_form`] followed by a best-effort write to the prediction
/// log. Only the prediction itself can fail the request.
pub async fn predict_and_record(
    ctx: &PredictionContext,
    form: &HashMap<String, String>,
    log: Option<&PredictionLog>,
    user_id: Option<i64>,
    username: Option<String>,
) -> Result<PredictionResult, PredictionError> {
    let result = predict_from_form(ctx, form)?;
    if let Some(log) = log {
        log.record(ctx, form, &result, user_id, username).await;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::EXPECTED_FEATURES;
    use crate::models::metrics::MetricsTable;
    use crate::models::preprocessing::TransformStep;
    use crate::models::registry::ModelRegistry;
    use serde_json::json;

    fn reference_form() -> HashMap<String, String> {
        [
            ("Pregnancies", "2"),
            ("Glucose", "85"),
            ("BloodPressure", "70"),
            ("SkinThickness", "20"),
            ("Insulin", "80"),
            ("BMI", "22.0"),
            ("DiabetesPedigreeFunction", "0.3"),
            ("Age", "30"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    /// Weight only on the Glucose_Category_Secret column.
    fn secret_glucose_weights() -> Vec<f64> {
        EXPECTED_FEATURES
            .iter()
            .map(|name| if *name == "Glucose_Category_Secret" { 4.0 } else { 0.0 })
            .collect()
    }

    fn entry(name: &str, artifact: serde_json::Value) -> ModelEntry {
        ModelEntry::from_bytes(name.to_string(), artifact.to_string().as_bytes()).unwrap()
    }

    fn context() -> PredictionContext {
        let mut registry = ModelRegistry::new();
        registry.insert(entry(
            "Logistic Regression",
            json!({
                "preprocessing": [],
                "estimator": {"type": "logistic_regression", "coefficients": secret_glucose_weights(), "intercept": -2.0}
            }),
        ));
        registry.insert(entry(
            "Linear Svc",
            json!({
                "estimator": {"type": "linear_svc", "coefficients": secret_glucose_weights(), "intercept": -2.0}
            }),
        ));
        let preprocessor = Preprocessor {
            steps: vec![TransformStep::StandardScaler {
                mean: vec![0.0; 17],
                scale: vec![1.0; 17],
            }],
        };
        let metrics = MetricsTable::from_value(json!({
            "Linear Svc": {"Accuracy": 0.8},
            "Logistic Regression": {"Accuracy": 0.8}
        }))
        .unwrap();
        PredictionContext::new(registry, Some(preprocessor), Some(metrics))
    }

    #[test]
    fn test_confidence_message() {
        assert_eq!(confidence_message(Some(0.87654)), "Confidence: 87.65%");
        assert_eq!(confidence_message(Some(1.0)), "Confidence: 100.00%");
        assert_eq!(confidence_message(None), "No Probability Available");
    }

    #[test]
    fn test_reference_observation_with_named_model() {
        let ctx = context();
        let mut form = reference_form();
        form.insert("model".to_string(), "Logistic Regression".to_string());

        let result = predict_from_form(&ctx, &form).unwrap();
        assert_eq!(result.label, DiagnosisLabel::NotDiabetic);
        assert_eq!(result.model_used, "Logistic Regression");
        let p = result.probability.unwrap();
        assert!((p - 1.0 / (1.0 + 2.0f64.exp())).abs() < 1e-12);
    }

    #[test]
    fn test_high_glucose_is_diabetic() {
        let ctx = context();
        let mut form = reference_form();
        form.insert("Glucose".to_string(), "200".to_string());
        form.insert("model".to_string(), "Logistic Regression".to_string());

        let result = predict_from_form(&ctx, &form).unwrap();
        assert_eq!(result.label, DiagnosisLabel::Diabetic);
        assert!(result.probability.unwrap() > 0.5);
    }

    #[test]
    fn test_best_uses_first_of_tied_metrics() {
        let ctx = context();
        for _ in 0..3 {
            let result = predict_from_form(&ctx, &reference_form()).unwrap();
            assert_eq!(result.model_used, "Linear Svc");
            assert_eq!(result.probability, None);
            assert_eq!(result.confidence_message, "No Probability Available");
        }
    }

    #[test]
    fn test_standalone_without_preprocessor() {
        let base = context();
        let ctx = PredictionContext::new(base.registry().clone(), None, None);
        let mut form = reference_form();
        form.insert("model".to_string(), "Linear Svc".to_string());

        assert_eq!(
            predict_from_form(&ctx, &form),
            Err(PredictionError::PreprocessorUnavailable("Linear Svc".to_string()))
        );

        // Pipeline models are unaffected
        form.insert("model".to_string(), "Logistic Regression".to_string());
        assert!(predict_from_form(&ctx, &form).is_ok());
    }

    #[test]
    fn test_request_errors() {
        let ctx = context();

        let mut form = reference_form();
        form.insert("model".to_string(), "Naive Bayes".to_string());
        assert_eq!(
            predict_from_form(&ctx, &form),
            Err(PredictionError::ModelNotFound("Naive Bayes".to_string()))
        );
        // Lookup failures leave the context untouched
        assert_eq!(ctx.registry().len(), 2);
        assert_eq!(ctx.metrics().unwrap().len(), 2);

        let mut form = reference_form();
        form.remove("Age");
        assert!(matches!(
            predict_from_form(&ctx, &form),
            Err(PredictionError::Validation(ref errors)) if errors.len() == 1 && errors[0].field == "Age"
        ));

        let empty = PredictionContext::default();
        assert_eq!(
            predict_from_form(&empty, &reference_form()),
            Err(PredictionError::NoModelsAvailable)
        );
    }

    #[test]
    fn test_preprocessor_width_mismatch() {
        let ctx = PredictionContext::new(
            context().registry().clone(),
            Some(Preprocessor {
                steps: vec![TransformStep::StandardScaler {
                    mean: vec![0.0; 8],
                    scale: vec![1.0; 8],
                }],
            }),
            None,
        );
        let mut form = reference_form();
        form.insert("model".to_string(), "Linear Svc".to_string());
        assert!(matches!(
            predict_from_form(&ctx, &form),
            Err(PredictionError::FeatureShapeMismatch { expected: 8, actual: 17, .. })
        ));
    }

    #[test]
    fn test_result_serialization() {
        let result = PredictionResult {
            label: DiagnosisLabel::NotDiabetic,
            probability: Some(0.25),
            model_used: "Random Forest".to_string(),
            confidence_message: confidence_message(Some(0.25)),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["result"], "Not Diabetic");
        assert_eq!(value["probability"], 0.25);
        assert_eq!(value["model_used"], "Random Forest");
        assert_eq!(value["confidence_message"], "Confidence: 25.00%");
    }

    #[test]
    fn test_parallel_predictions_share_context() {
        let ctx = std::sync::Arc::new(context());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ctx = std::sync::Arc::clone(&ctx);
                std::thread::spawn(move || {
                    let mut form = reference_form();
                    let glucose = if i % 2 == 0 { "85" } else { "200" };
                    form.insert("Glucose".to_string(), glucose.to_string());
                    form.insert("model".to_string(), "Logistic Regression".to_string());
                    (i, predict_from_form(&ctx, &form).unwrap().label)
                })
            })
            .collect();

        for handle in handles {
            let (i, label) = handle.join().unwrap();
            let expected = if i % 2 == 0 {
                DiagnosisLabel::NotDiabetic
            } else {
                DiagnosisLabel::Diabetic
            };
            assert_eq!(label, expected);
        }
    }

    #[tokio::test]
    async fn test_unwritable_log_does_not_fail_prediction() {
        let ctx = context();
        let dir = tempfile::tempdir().unwrap();
        let log = PredictionLog::new(dir.path());
        let mut form = reference_form();
        form.insert("model".to_string(), "Logistic Regression".to_string());

        let result = predict_and_record(&ctx, &form, Some(&log), Some(1), None)
            .await
            .unwrap();
        assert_eq!(result.model_used, "Logistic Regression");
        assert_eq!(result.label, DiagnosisLabel::NotDiabetic);
    }

    #[tokio::test]
    async fn test_predict_and_record_appends_fingerprinted_entry() {
        let ctx = context();
        let dir = tempfile::tempdir().unwrap();
        let log = PredictionLog::new(dir.path().join("predictions.jsonl"));
        let mut form = reference_form();
        form.insert("Glucose".to_string(), "200".to_string());
        form.insert("model".to_string(), "Logistic Regression".to_string());

        let result = predict_and_record(&ctx, &form, Some(&log), Some(9), None)
            .await
            .unwrap();

        let history = log.history_for_user(9).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].prediction, result.label);
        assert_eq!(history[0].model, "Logistic Regression");
        assert_eq!(
            history[0].model_fingerprint.as_deref(),
            Some(ctx.registry().get("Logistic Regression").unwrap().fingerprint.as_str())
        );

        // Rejected requests are not recorded
        form.remove("BMI");
        assert!(predict_and_record(&ctx, &form, Some(&log), Some(9), None)
            .await
            .is_err());
        assert_eq!(log.history_for_user(9).await.unwrap().len(), 1);
    }
}
