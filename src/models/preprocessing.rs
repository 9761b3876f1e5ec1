// src/models/preprocessing.rs
use anyhow::{bail, Context, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::PredictionError;

/// One fitted column-wise transform.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformStep {
    /// `(x - mean) / scale`
    StandardScaler { mean: Vec<f64>, scale: Vec<f64> },
    /// `x * scale + min`
    MinMaxScaler { min: Vec<f64>, scale: Vec<f64> },
}

impl TransformStep {
    pub fn name(&self) -> &'static str {
        match self {
            TransformStep::StandardScaler { .. } => "standard_scaler",
            TransformStep::MinMaxScaler { .. } => "min_max_scaler",
        }
    }

    pub fn width(&self) -> usize {
        match self {
            TransformStep::StandardScaler { mean, .. } => mean.len(),
            TransformStep::MinMaxScaler { min, .. } => min.len(),
        }
    }

    fn validate(&self) -> Result<()> {
        let (a, b) = match self {
            TransformStep::StandardScaler { mean, scale } => (mean.len(), scale.len()),
            TransformStep::MinMaxScaler { min, scale } => (min.len(), scale.len()),
        };
        if a != b {
            bail!(
                "{}: parameter lengths differ ({} vs {})",
                self.name(),
                a,
                b
            );
        }
        if let TransformStep::StandardScaler { scale, .. } = self {
            if scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
                bail!("standard_scaler: scale must be finite and non-zero");
            }
        }
        Ok(())
    }

    pub fn apply(&self, x: &Array1<f64>) -> Result<Array1<f64>, PredictionError> {
        if x.len() != self.width() {
            return Err(PredictionError::FeatureShapeMismatch {
                stage: self.name().to_string(),
                expected: self.width(),
                actual: x.len(),
            });
        }
        let out = match self {
            TransformStep::StandardScaler { mean, scale } => {
                (x - &Array1::from(mean.clone())) / &Array1::from(scale.clone())
            }
            TransformStep::MinMaxScaler { min, scale } => {
                x * &Array1::from(scale.clone()) + &Array1::from(min.clone())
            }
        };
        Ok(out)
    }
}

/// Runs the steps in order.
pub fn apply_steps(
    steps: &[TransformStep],
    x: Array1<f64>,
) -> Result<Array1<f64>, PredictionError> {
    steps.iter().try_fold(x, |acc, step| step.apply(&acc))
}

pub fn validate_steps(steps: &[TransformStep]) -> Result<()> {
    for (idx, step) in steps.iter().enumerate() {
        step.validate()
            .with_context(|| format!("Invalid preprocessing step #{}", idx))?;
    }
    Ok(())
}

/// The shared fitted preprocessor used by standalone models.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Preprocessor {
    pub steps: Vec<TransformStep>,
}

impl Preprocessor {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read preprocessor {}", path.display()))?;
        let preprocessor: Preprocessor = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse preprocessor {}", path.display()))?;
        validate_steps(&preprocessor.steps)?;
        Ok(preprocessor)
    }

    pub fn transform(&self, x: Array1<f64>) -> Result<Array1<f64>, PredictionError> {
        apply_steps(&self.steps, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standard_scaler() {
        let step = TransformStep::StandardScaler {
            mean: vec![1.0, 10.0],
            scale: vec![2.0, 5.0],
        };
        let out = step.apply(&array![3.0, 0.0]).unwrap();
        assert_eq!(out, array![1.0, -2.0]);
    }

    #[test]
    fn test_steps_run_in_order() {
        let steps = vec![
            TransformStep::StandardScaler {
                mean: vec![1.0],
                scale: vec![2.0],
            },
            TransformStep::MinMaxScaler {
                min: vec![0.5],
                scale: vec![0.25],
            },
        ];
        // (5 - 1) / 2 = 2, then 2 * 0.25 + 0.5 = 1
        let out = apply_steps(&steps, array![5.0]).unwrap();
        assert_eq!(out, array![1.0]);
    }

    #[test]
    fn test_width_mismatch_is_an_error() {
        let step = TransformStep::MinMaxScaler {
            min: vec![0.0; 3],
            scale: vec![1.0; 3],
        };
        match step.apply(&array![1.0, 2.0]) {
            Err(PredictionError::FeatureShapeMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 3);
                assert_eq!(actual, 2);
            }
            other => panic!("expected shape mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_load_rejects_inconsistent_steps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preprocessor.json");
        std::fs::write(
            &path,
            r#"{"steps":[{"type":"standard_scaler","mean":[0.0,1.0],"scale":[1.0]}]}"#,
        )
        .unwrap();
        assert!(Preprocessor::load(&path).is_err());

        std::fs::write(
            &path,
            r#"{"steps":[{"type":"standard_scaler","mean":[0.0],"scale":[0.0]}]}"#,
        )
        .unwrap();
        assert!(Preprocessor::load(&path).is_err());

        std::fs::write(
            &path,
            r#"{"steps":[{"type":"min_max_scaler","min":[0.0],"scale":[0.5]}]}"#,
        )
        .unwrap();
        let loaded = Preprocessor::load(&path).unwrap();
        assert_eq!(loaded.transform(array![4.0]).unwrap(), array![2.0]);
    }
}
