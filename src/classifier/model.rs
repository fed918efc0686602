//! Frozen model artifacts.
//!
//! The pipeline only sees the [`StressModel`] trait. The shipped artifact
//! format is a standardized linear softmax classifier stored as JSON:
//!
//! ```json
//! {
//!   "format": "linear-softmax",
//!   "version": 1,
//!   "feature_names": ["acc_x_mean", "..."],
//!   "labels": [0, 1, 2, 3, 4],
//!   "feature_mean": [...],
//!   "feature_scale": [...],
//!   "weights": [[...], ...],
//!   "bias": [...]
//! }
//! ```

use crate::classifier::ClassifierError;
use crate::core::features::{FeatureVector, FEATURE_NAMES};
use crate::core::labels::{LabelId, StressLabel};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output of a single prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: StressLabel,
    /// Probability assigned to `label` (0-1)
    pub confidence: f64,
}

/// A loaded, read-only classification model.
pub trait StressModel: Send + Sync + fmt::Debug {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Map a window's feature vector to a label.
    fn predict(&self, features: &FeatureVector) -> Result<Prediction, ClassifierError>;
}

/// On-disk representation of [`LinearSoftmaxModel`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSoftmaxArtifact {
    pub format: String,
    pub version: u32,
    pub feature_names: Vec<String>,
    pub labels: Vec<LabelId>,
    pub feature_mean: Vec<f64>,
    pub feature_scale: Vec<f64>,
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

/// Format tag accepted by [`LinearSoftmaxModel::from_artifact`].
pub const LINEAR_SOFTMAX_FORMAT: &str = "linear-softmax";

/// Standardized multinomial logistic regression.
#[derive(Debug, Clone)]
pub struct LinearSoftmaxModel {
    labels: Vec<StressLabel>,
    mean: Vec<f64>,
    scale: Vec<f64>,
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

impl LinearSoftmaxModel {
    /// Parse and validate an artifact from JSON text.
    pub fn from_json(json: &str) -> Result<Self, ClassifierError> {
        let artifact: LinearSoftmaxArtifact = serde_json::from_str(json)
            .map_err(|e| ClassifierError::ModelLoad(format!("invalid artifact JSON: {e}")))?;
        Self::from_artifact(artifact)
    }

    pub fn from_artifact(artifact: LinearSoftmaxArtifact) -> Result<Self, ClassifierError> {
        let invalid = |msg: String| Err(ClassifierError::ModelLoad(msg));

        if artifact.format != LINEAR_SOFTMAX_FORMAT {
            return invalid(format!("unsupported model format `{}`", artifact.format));
        }
        if artifact.feature_names.len() != FEATURE_NAMES.len()
            || artifact
                .feature_names
                .iter()
                .zip(FEATURE_NAMES.iter())
                .any(|(a, b)| a != b)
        {
            return invalid("feature layout does not match this build".to_string());
        }

        let n_features = FEATURE_NAMES.len();
        let n_classes = artifact.labels.len();
        if n_classes == 0 {
            return invalid("model declares no labels".to_string());
        }
        if artifact.feature_mean.len() != n_features || artifact.feature_scale.len() != n_features
        {
            return invalid("standardization vectors have the wrong length".to_string());
        }
        if artifact.feature_scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return invalid("feature scales must be positive".to_string());
        }
        if artifact.weights.len() != n_classes
            || artifact.weights.iter().any(|row| row.len() != n_features)
            || artifact.bias.len() != n_classes
        {
            return invalid(format!(
                "weights must be {n_classes}x{n_features} with {n_classes} biases"
            ));
        }

        let labels = artifact
            .labels
            .iter()
            .map(|&id| {
                StressLabel::from_id(id)
                    .ok_or_else(|| ClassifierError::ModelLoad(format!("unknown label id {id}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            labels,
            mean: artifact.feature_mean,
            scale: artifact.feature_scale,
            weights: artifact.weights,
            bias: artifact.bias,
        })
    }

    pub fn labels(&self) -> &[StressLabel] {
        &self.labels
    }
}

impl StressModel for LinearSoftmaxModel {
    fn name(&self) -> &str {
        LINEAR_SOFTMAX_FORMAT
    }

    fn predict(&self, features: &FeatureVector) -> Result<Prediction, ClassifierError> {
        let x = features.as_slice();
        if x.len() != self.mean.len() {
            return Err(ClassifierError::FeatureMismatch {
                expected: self.mean.len(),
                actual: x.len(),
            });
        }

        let z: Vec<f64> = x
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(v, (m, s))| (v - m) / s)
            .collect();

        let logits: Vec<f64> = self
            .weights
            .iter()
            .zip(self.bias.iter())
            .map(|(row, b)| row.iter().zip(z.iter()).map(|(w, v)| w * v).sum::<f64>() + b)
            .collect();

        let (best, best_logit) = logits
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |acc, (i, l)| {
                if l > acc.1 {
                    (i, l)
                } else {
                    acc
                }
            });

        if !best_logit.is_finite() {
            return Err(ClassifierError::Inference(
                "model produced non-finite scores".to_string(),
            ));
        }

        // Softmax probability of the winning class
        let denom: f64 = logits.iter().map(|l| (l - best_logit).exp()).sum();

        Ok(Prediction {
            label: self.labels[best],
            confidence: 1.0 / denom,
        })
    }
}
