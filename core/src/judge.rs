//! The judge contract.
//!
//! The pattern and anomaly judges share one capability: score a feature
//! vector. The network judge investigates the transaction graph instead
//! and has its own entry point (see network_judge.rs); the ensemble
//! dispatches both shapes without any subclassing assumptions.

use crate::features::FeatureVector;

/// One judge's opinion on a transaction.
#[derive(Debug, Clone)]
pub struct Assessment {
    /// Risk contribution in [0, 1].
    pub score: f64,
    pub verdict: String,
    /// True when the judge's learned model was unavailable and the
    /// assessment fell back to heuristics only.
    pub degraded: bool,
}

pub trait Judge: Send {
    /// Unique stable name for this judge.
    fn name(&self) -> &'static str;

    /// Score a live feature vector. Must never fail the request:
    /// internal problems degrade the assessment instead.
    fn assess(&self, features: &FeatureVector) -> Assessment;
}
