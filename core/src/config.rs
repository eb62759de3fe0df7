//! Engine configuration.
//!
//! Tunable thresholds live here; rule constants the detection logic fixes
//! (structuring band, shell-entity bounds, verdict cut-points) stay with
//! their judges.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeWeights {
    pub pattern: f64,
    pub anomaly: f64,
    pub network: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Distinct customers on one device above which collision fires.
    pub device_collision_threshold: i64,
    /// Distinct senders (including the live one) at which fan-in fires.
    pub fan_in_threshold: i64,
    /// Trailing window for the fan-in count, in hours.
    pub fan_in_window_hours: i64,
    /// Maximum cycle length searched, in hops. 3 covers both the direct
    /// A->B->A loop and the layered A->B->C->A variant.
    pub max_cycle_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdRuleConfig {
    /// Breach multiplier applied to the horizon average.
    pub multiplier: f64,
    /// Fallback average when a customer has no profile row.
    pub customer_default_avg: f64,
    /// Fallback average when a relationship has no profile row.
    pub relationship_default_avg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelConfig {
    pub weights: JudgeWeights,
    /// Final score above which the verdict is BLOCKED.
    pub block_threshold: f64,
    pub network: NetworkConfig,
    pub threshold_rules: ThresholdRuleConfig,
    /// Payment categories counted as operating expense.
    pub opex_categories: Vec<String>,
    /// Artifact paths for the learned models, relative to the working dir.
    pub pattern_model_path: String,
    pub anomaly_model_path: String,
}

impl SentinelConfig {
    /// Load from a JSON config file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            weights: JudgeWeights {
                pattern: 0.4,
                anomaly: 0.3,
                network: 0.3,
            },
            block_threshold: 0.5,
            network: NetworkConfig {
                device_collision_threshold: 3,
                fan_in_threshold: 5,
                fan_in_window_hours: 24,
                max_cycle_depth: 3,
            },
            threshold_rules: ThresholdRuleConfig {
                multiplier: 2.0,
                customer_default_avg: 1000.0,
                relationship_default_avg: 5000.0,
            },
            opex_categories: vec![
                "Rent".into(),
                "Utilities".into(),
                "Electricity Bill".into(),
                "Payroll".into(),
                "Groceries".into(),
            ],
            pattern_model_path: "models/pattern_logistic.json".into(),
            anomaly_model_path: "models/anomaly_deviation.json".into(),
        }
    }
}
