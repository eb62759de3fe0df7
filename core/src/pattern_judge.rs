//! Pattern judge — supervised probability plus expert rules.
//!
//! The learned classifier carries the weight of historical fraud labels;
//! two deterministic heuristics cover patterns the training data is too
//! thin to teach: structuring just under the reporting threshold, and
//! bust-out spending on freshly opened accounts.

use crate::{
    features::FeatureVector,
    judge::{Assessment, Judge},
    model::{Classifier, LogisticModel},
};

// ── Constants ────────────────────────────────────────────────────────────────

/// Structuring band: deliberately narrow, just under the 50k reporting line.
const STRUCTURING_MIN: f64 = 48_000.0;
const STRUCTURING_MAX: f64 = 50_000.0;
const STRUCTURING_BUMP: f64 = 0.2;

const BUST_OUT_MAX_AGE_DAYS: i64 = 5;
const BUST_OUT_MIN_AMOUNT: f64 = 50_000.0;
const BUST_OUT_BUMP: f64 = 0.3;

const HIGH_RISK_CUTOFF: f64 = 0.75;
const SUSPICIOUS_CUTOFF: f64 = 0.4;

pub const VERDICT_HIGH_RISK: &str = "High Risk Pattern";
pub const VERDICT_SUSPICIOUS: &str = "Suspicious Activity";
pub const VERDICT_NORMAL: &str = "Normal";
pub const VERDICT_DEGRADED: &str = "Model Unavailable";

// ── Judge ────────────────────────────────────────────────────────────────────

pub struct PatternJudge {
    model: Option<Box<dyn Classifier>>,
}

impl PatternJudge {
    pub fn new(model: Box<dyn Classifier>) -> Self {
        Self { model: Some(model) }
    }

    /// A judge with no learned model. Heuristic rules still apply, and
    /// every assessment carries the degraded flag.
    pub fn degraded() -> Self {
        Self { model: None }
    }

    /// Load the logistic artifact from disk, degrading on failure.
    pub fn from_artifact(path: &str) -> Self {
        match LogisticModel::load(path) {
            Ok(model) => Self::new(Box::new(model)),
            Err(e) => {
                log::warn!("pattern judge: {e}; running degraded");
                Self::degraded()
            }
        }
    }
}

impl Judge for PatternJudge {
    fn name(&self) -> &'static str {
        "pattern"
    }

    fn assess(&self, features: &FeatureVector) -> Assessment {
        let (learned, degraded) = match &self.model {
            Some(model) => (model.predict(features).clamp(0.0, 1.0), false),
            None => (0.0, true),
        };

        let mut score = learned;

        if (STRUCTURING_MIN..STRUCTURING_MAX).contains(&features.amount) {
            score += STRUCTURING_BUMP;
        }

        if features.account_age_days < BUST_OUT_MAX_AGE_DAYS
            && features.amount > BUST_OUT_MIN_AMOUNT
        {
            score += BUST_OUT_BUMP;
        }

        let score = score.min(1.0);

        let verdict = if score > HIGH_RISK_CUTOFF {
            VERDICT_HIGH_RISK
        } else if score > SUSPICIOUS_CUTOFF {
            VERDICT_SUSPICIOUS
        } else if degraded {
            VERDICT_DEGRADED
        } else {
            VERDICT_NORMAL
        };

        if score > SUSPICIOUS_CUTOFF {
            log::info!(
                "pattern judge: score {score:.2} ({verdict}) for amount {:.2}",
                features.amount
            );
        }

        Assessment {
            score,
            verdict: verdict.to_string(),
            degraded,
        }
    }
}
