// src/models/estimator.rs
//! Serialized classifier artifacts and their inference.
//!
//! Every estimator here is a binary classifier over class ids `0` and `1`.
//! The label and the positive-class probability are computed independently,
//! matching how the training library exposed `predict` and `predict_proba`.

use anyhow::{bail, Result};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::PredictionError;
use crate::models::preprocessing::{validate_steps, TransformStep};

/// Raw class output of a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPrediction {
    pub class: u8,
    pub probability: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TreeNode {
    /// `None` for leaves.
    #[serde(default)]
    pub feature: Option<usize>,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub left: Option<usize>,
    #[serde(default)]
    pub right: Option<usize>,
    /// Per-class weight `[class0, class1]` at this node.
    pub value: [f64; 2],
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn validate(&self, n_features: usize) -> Result<()> {
        if self.nodes.is_empty() {
            bail!("decision tree has no nodes");
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match (node.feature, node.left, node.right) {
                (None, None, None) => {
                    if node.value.iter().any(|w| *w < 0.0) || node.value.iter().sum::<f64>() <= 0.0
                    {
                        bail!("leaf {} has no positive class weight", idx);
                    }
                }
                (Some(feature), Some(left), Some(right)) => {
                    if feature >= n_features {
                        bail!(
                            "node {} splits on feature {} but the model has {} features",
                            idx,
                            feature,
                            n_features
                        );
                    }
                    // Children must come after the parent, which rules out cycles
                    if left <= idx || right <= idx || left >= self.nodes.len() || right >= self.nodes.len() {
                        bail!("node {} has invalid children ({}, {})", idx, left, right);
                    }
                }
                _ => bail!("node {} is neither a complete split nor a leaf", idx),
            }
        }
        Ok(())
    }

    /// Class distribution `[p0, p1]` of the leaf reached by `x`.
    ///
    /// Trees built in code skip `validate`, so every index is checked and the
    /// walk is bounded by the node count.
    fn leaf_distribution(&self, x: ArrayView1<f64>) -> Result<[f64; 2], PredictionError> {
        let mut idx = 0;
        for _ in 0..self.nodes.len() {
            let node = self.nodes.get(idx).ok_or_else(|| {
                PredictionError::MalformedModel(format!("decision tree has no node {}", idx))
            })?;
            match (node.feature, node.left, node.right) {
                (Some(feature), Some(left), Some(right)) => {
                    let value = x.get(feature).ok_or_else(|| {
                        PredictionError::MalformedModel(format!(
                            "node {} splits on missing feature {}",
                            idx, feature
                        ))
                    })?;
                    idx = if *value <= node.threshold { left } else { right };
                }
                _ => {
                    let total = node.value[0] + node.value[1];
                    if total.is_nan() || total <= 0.0 {
                        return Err(PredictionError::MalformedModel(format!(
                            "leaf {} has no positive class weight",
                            idx
                        )));
                    }
                    return Ok([node.value[0] / total, node.value[1] / total]);
                }
            }
        }
        Err(PredictionError::MalformedModel(
            "decision tree never reaches a leaf".to_string(),
        ))
    }
}

fn argmax_class(distribution: [f64; 2]) -> u8 {
    // Ties resolve to the first class
    if distribution[1] > distribution[0] {
        1
    } else {
        0
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Estimator {
    LogisticRegression {
        coefficients: Vec<f64>,
        intercept: f64,
    },
    LinearSvc {
        coefficients: Vec<f64>,
        intercept: f64,
    },
    DecisionTree {
        n_features: usize,
        tree: DecisionTree,
        #[serde(default)]
        feature_importances: Option<Vec<f64>>,
    },
    RandomForest {
        n_features: usize,
        trees: Vec<DecisionTree>,
        #[serde(default)]
        feature_importances: Option<Vec<f64>>,
    },
}

impl Estimator {
    pub fn name(&self) -> &'static str {
        match self {
            Estimator::LogisticRegression { .. } => "logistic_regression",
            Estimator::LinearSvc { .. } => "linear_svc",
            Estimator::DecisionTree { .. } => "decision_tree",
            Estimator::RandomForest { .. } => "random_forest",
        }
    }

    pub fn n_features(&self) -> usize {
        match self {
            Estimator::LogisticRegression { coefficients, .. }
            | Estimator::LinearSvc { coefficients, .. } => coefficients.len(),
            Estimator::DecisionTree { n_features, .. }
            | Estimator::RandomForest { n_features, .. } => *n_features,
        }
    }

    pub fn supports_probability(&self) -> bool {
        !matches!(self, Estimator::LinearSvc { .. })
    }

    /// Importances as stored by training, falling back to linear coefficients.
    pub fn feature_importances(&self) -> Option<&[f64]> {
        match self {
            Estimator::DecisionTree {
                feature_importances,
                ..
            }
            | Estimator::RandomForest {
                feature_importances,
                ..
            } => feature_importances.as_deref(),
            Estimator::LogisticRegression { coefficients, .. }
            | Estimator::LinearSvc { coefficients, .. } => Some(coefficients),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Estimator::LogisticRegression { coefficients, .. }
            | Estimator::LinearSvc { coefficients, .. } => {
                if coefficients.is_empty() {
                    bail!("{} has no coefficients", self.name());
                }
            }
            Estimator::DecisionTree {
                n_features, tree, ..
            } => tree.validate(*n_features)?,
            Estimator::RandomForest {
                n_features, trees, ..
            } => {
                if trees.is_empty() {
                    bail!("random_forest has no trees");
                }
                for tree in trees {
                    tree.validate(*n_features)?;
                }
            }
        }
        Ok(())
    }

    pub fn predict(&self, x: &Array1<f64>) -> Result<RawPrediction, PredictionError> {
        if x.len() != self.n_features() {
            return Err(PredictionError::FeatureShapeMismatch {
                stage: self.name().to_string(),
                expected: self.n_features(),
                actual: x.len(),
            });
        }

        let prediction = match self {
            Estimator::LogisticRegression {
                coefficients,
                intercept,
            } => {
                let decision = x.dot(&ArrayView1::from(coefficients.as_slice())) + intercept;
                RawPrediction {
                    class: u8::from(decision > 0.0),
                    probability: Some(sigmoid(decision)),
                }
            }
            Estimator::LinearSvc {
                coefficients,
                intercept,
            } => {
                let decision = x.dot(&ArrayView1::from(coefficients.as_slice())) + intercept;
                RawPrediction {
                    class: u8::from(decision > 0.0),
                    probability: None,
                }
            }
            Estimator::DecisionTree { tree, .. } => {
                let distribution = tree.leaf_distribution(x.view())?;
                RawPrediction {
                    class: argmax_class(distribution),
                    probability: Some(distribution[1]),
                }
            }
            Estimator::RandomForest { trees, .. } => {
                if trees.is_empty() {
                    return Err(PredictionError::MalformedModel(
                        "random_forest has no trees".to_string(),
                    ));
                }
                let mut mean = [0.0, 0.0];
                for tree in trees {
                    let d = tree.leaf_distribution(x.view())?;
                    mean[0] += d[0];
                    mean[1] += d[1];
                }
                let n = trees.len() as f64;
                mean[0] /= n;
                mean[1] /= n;
                RawPrediction {
                    class: argmax_class(mean),
                    probability: Some(mean[1]),
                }
            }
        };
        Ok(prediction)
    }
}

/// On-disk model document. A present `preprocessing` list (even an empty
/// one) marks a self-contained pipeline.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preprocessing: Option<Vec<TransformStep>>,
    pub estimator: Estimator,
}

impl ModelArtifact {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let artifact: ModelArtifact = serde_json::from_slice(bytes)?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn validate(&self) -> Result<()> {
        self.estimator.validate()?;
        if let Some(steps) = &self.preprocessing {
            validate_steps(steps)?;
        }
        Ok(())
    }
}
