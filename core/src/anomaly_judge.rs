//! Anomaly judge — distribution deviation plus the shell-entity rule.
//!
//! The learned deviation function flags statistical outliers; the
//! deterministic shell-entity rule models a business receiving large
//! volume with no evidence of operating expenditure, and always wins
//! over the learned score when it triggers.

use crate::{
    features::FeatureVector,
    judge::{Assessment, Judge},
    model::{DeviationModel, Deviator},
};

// ── Constants ────────────────────────────────────────────────────────────────

/// Raw deviation below this is a hard outlier.
const OUTLIER_CUTOFF: f64 = -0.15;

const SHELL_MIN_AMOUNT: f64 = 100_000.0;
const SHELL_MAX_OPEX_RATIO: f64 = 0.01;

pub const VERDICT_OUTLIER: &str = "Statistical Outlier";
pub const VERDICT_DEVIATING: &str = "Deviating Behavior";
pub const VERDICT_NORMAL: &str = "Normal";
pub const VERDICT_SHELL: &str = "Shell Entity Detected";
pub const VERDICT_DEGRADED: &str = "Model Unavailable";

// ── Judge ────────────────────────────────────────────────────────────────────

pub struct AnomalyJudge {
    model: Option<Box<dyn Deviator>>,
}

impl AnomalyJudge {
    pub fn new(model: Box<dyn Deviator>) -> Self {
        Self { model: Some(model) }
    }

    /// A judge with no learned model. The shell-entity rule still applies,
    /// and every assessment carries the degraded flag.
    pub fn degraded() -> Self {
        Self { model: None }
    }

    /// Load the deviation artifact from disk, degrading on failure.
    pub fn from_artifact(path: &str) -> Self {
        match DeviationModel::load(path) {
            Ok(model) => Self::new(Box::new(model)),
            Err(e) => {
                log::warn!("anomaly judge: {e}; running degraded");
                Self::degraded()
            }
        }
    }
}

impl Judge for AnomalyJudge {
    fn name(&self) -> &'static str {
        "anomaly"
    }

    fn assess(&self, features: &FeatureVector) -> Assessment {
        let (mut score, mut verdict, degraded) = match &self.model {
            Some(model) => {
                let raw = model.deviation(features);
                if raw < OUTLIER_CUTOFF {
                    (1.0, VERDICT_OUTLIER, false)
                } else if raw < 0.0 {
                    (0.5, VERDICT_DEVIATING, false)
                } else {
                    (0.0, VERDICT_NORMAL, false)
                }
            }
            None => (0.0, VERDICT_DEGRADED, true),
        };

        // Deterministic override: the shell rule beats the learned score.
        if features.amount > SHELL_MIN_AMOUNT && features.opex_ratio < SHELL_MAX_OPEX_RATIO {
            score = 1.0;
            verdict = VERDICT_SHELL;
            log::warn!(
                "anomaly judge: shell entity pattern (amount {:.2}, opex ratio {:.4})",
                features.amount,
                features.opex_ratio
            );
        }

        Assessment {
            score,
            verdict: verdict.to_string(),
            degraded,
        }
    }
}
