//! Learned-model artifacts.
//!
//! The pattern and anomaly judges consume externally trained parameters.
//! Training happens offline; the engine only loads the resulting JSON
//! artifacts at startup and treats them as black boxes behind the
//! `Classifier` and `Deviator` capability traits. A judge constructed
//! without a working artifact runs in an explicit degraded state — it
//! never silently scores zero.

use crate::{
    error::{SentinelError, SentinelResult},
    features::FeatureVector,
};
use serde::{Deserialize, Serialize};

/// Supervised fraud-probability capability.
pub trait Classifier: Send {
    /// Probability of fraud in [0, 1].
    fn predict(&self, features: &FeatureVector) -> f64;
}

/// Unsupervised deviation capability. More negative = more anomalous.
pub trait Deviator: Send {
    fn deviation(&self, features: &FeatureVector) -> f64;
}

/// Per-feature standardization parameters shared by both artifacts.
/// Order: amount, opex_ratio, users_on_device, account_age_days.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureScaling {
    pub means: [f64; 4],
    pub stds: [f64; 4],
}

impl FeatureScaling {
    fn standardize(&self, features: &FeatureVector) -> [f64; 4] {
        let raw = features.as_array();
        let mut z = [0.0; 4];
        for i in 0..4 {
            let std = if self.stds[i].abs() < f64::EPSILON {
                1.0
            } else {
                self.stds[i]
            };
            z[i] = (raw[i] - self.means[i]) / std;
        }
        z
    }
}

/// Standardized logistic regression over the four live features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    pub scaling: FeatureScaling,
    pub weights: [f64; 4],
    pub bias: f64,
}

impl LogisticModel {
    pub fn load(path: &str) -> SentinelResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|_| {
            SentinelError::ModelUnavailable {
                name: path.to_string(),
            }
        })?;
        let model = serde_json::from_str(&content)?;
        Ok(model)
    }
}

impl Classifier for LogisticModel {
    fn predict(&self, features: &FeatureVector) -> f64 {
        let z = self.scaling.standardize(features);
        let logit: f64 = z
            .iter()
            .zip(self.weights.iter())
            .map(|(x, w)| x * w)
            .sum::<f64>()
            + self.bias;
        1.0 / (1.0 + (-logit).exp())
    }
}

/// Centered z-distance deviation model. The score is `offset` minus the
/// mean absolute z-distance of the features, so points far from the
/// training distribution go negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviationModel {
    pub scaling: FeatureScaling,
    pub offset: f64,
}

impl DeviationModel {
    pub fn load(path: &str) -> SentinelResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|_| {
            SentinelError::ModelUnavailable {
                name: path.to_string(),
            }
        })?;
        let model = serde_json::from_str(&content)?;
        Ok(model)
    }
}

impl Deviator for DeviationModel {
    fn deviation(&self, features: &FeatureVector) -> f64 {
        let z = self.scaling.standardize(features);
        let mean_abs = z.iter().map(|x| x.abs()).sum::<f64>() / 4.0;
        self.offset - mean_abs
    }
}
