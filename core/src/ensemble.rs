//! The risk ensemble — fan-out to the three judges, fuse, persist.
//!
//! One `RiskEnsemble` per scoring context: it owns a store connection and
//! the judge instances, wired at service startup. Judges never mutate
//! shared state, so contexts can run side by side, each on its own
//! connection (`SentinelStore::reopen`).
//!
//! Judge-local failures degrade the individual assessment and stay
//! visible in the breakdown; only the final ledger append can fail the
//! request, because without it the side effect is not guaranteed.

use crate::{
    anomaly_judge::{self, AnomalyJudge},
    config::SentinelConfig,
    error::{SentinelError, SentinelResult},
    features::FeatureExtractor,
    judge::{Assessment, Judge},
    network_judge::{NetworkFindings, NetworkJudge, NetworkReason},
    pattern_judge::PatternJudge,
    store::{SentinelStore, TransactionRecord},
    types::CustomerId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_PAYMENT_CATEGORY: &str = "Transfer";

// ── Request / response contracts ─────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ScoreRequest {
    pub customer_id: CustomerId,
    pub amount: f64,
    pub device_id: String,
    pub beneficiary_account: String,
    pub account_age_days: i64,
    /// Effective transaction time; defaults to now.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub payment_category: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictStatus {
    Approved,
    /// Reserved for operator triage queues; the ensemble itself only
    /// approves or blocks.
    Flagged,
    Blocked,
}

#[derive(Debug, Clone, Serialize)]
pub struct JudgeReport {
    pub score: f64,
    pub verdict: String,
    pub degraded: bool,
}

impl From<&Assessment> for JudgeReport {
    fn from(a: &Assessment) -> Self {
        Self {
            score: a.score,
            verdict: a.verdict.clone(),
            degraded: a.degraded,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkReport {
    pub score: f64,
    pub verdict: String,
    pub details: Vec<String>,
    pub degraded: bool,
}

impl From<&NetworkFindings> for NetworkReport {
    fn from(f: &NetworkFindings) -> Self {
        Self {
            score: f.score,
            verdict: f.verdict.clone(),
            details: f.reasons.iter().map(|r| r.to_string()).collect(),
            degraded: f.degraded,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelBreakdown {
    pub pattern: JudgeReport,
    pub anomaly: JudgeReport,
    pub network: NetworkReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub status: VerdictStatus,
    /// Final fused score scaled to [0, 100], two decimals.
    pub risk_score: f64,
    pub model_breakdown: ModelBreakdown,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fraud_type: Option<String>,
}

// ── Ensemble ─────────────────────────────────────────────────────────────────

pub struct RiskEnsemble {
    store: SentinelStore,
    pattern: PatternJudge,
    anomaly: AnomalyJudge,
    network: NetworkJudge,
    config: SentinelConfig,
}

impl RiskEnsemble {
    /// Wire a scoring context from config, loading model artifacts from
    /// their configured paths. Missing artifacts leave the affected judge
    /// degraded rather than failing startup.
    pub fn new(store: SentinelStore, config: SentinelConfig) -> Self {
        let pattern = PatternJudge::from_artifact(&config.pattern_model_path);
        let anomaly = AnomalyJudge::from_artifact(&config.anomaly_model_path);
        let network = NetworkJudge::new(config.network.clone());
        Self {
            store,
            pattern,
            anomaly,
            network,
            config,
        }
    }

    /// Wire a scoring context with explicit judges (tests, custom models).
    pub fn with_judges(
        store: SentinelStore,
        config: SentinelConfig,
        pattern: PatternJudge,
        anomaly: AnomalyJudge,
    ) -> Self {
        let network = NetworkJudge::new(config.network.clone());
        Self {
            store,
            pattern,
            anomaly,
            network,
            config,
        }
    }

    pub fn store(&self) -> &SentinelStore {
        &self.store
    }

    /// Score one transaction and append it to the ledger.
    pub fn score(&self, request: &ScoreRequest) -> SentinelResult<Verdict> {
        Self::validate(request)?;
        let at = request.timestamp.unwrap_or_else(Utc::now);

        let extractor = FeatureExtractor::new(&self.store, &self.config.opex_categories);
        let features = extractor.extract(
            request.customer_id,
            request.amount,
            &request.device_id,
            request.account_age_days,
        );

        // The three judges are independent: none reads another's output
        // and none writes, so evaluation order is irrelevant.
        let pattern = self.pattern.assess(&features);
        let anomaly = self.anomaly.assess(&features);
        for (judge, assessment) in [(self.pattern.name(), &pattern), (self.anomaly.name(), &anomaly)] {
            if assessment.degraded {
                log::warn!(
                    "{judge} judge degraded for customer {}",
                    request.customer_id
                );
            }
        }
        let network = self.network.investigate(
            &self.store,
            &request.device_id,
            request.customer_id,
            &request.beneficiary_account,
            &at,
        );

        let w = &self.config.weights;
        let final_score =
            w.pattern * pattern.score + w.anomaly * anomaly.score + w.network * network.score;

        let blocked = network.score >= 1.0 || final_score > self.config.block_threshold;
        let status = if blocked {
            VerdictStatus::Blocked
        } else {
            VerdictStatus::Approved
        };
        let fraud_type = blocked.then(|| Self::fraud_type_label(&network, &anomaly));

        self.append_scored(request, &at, blocked, fraud_type.as_deref())?;

        if blocked {
            log::warn!(
                "customer {}: BLOCKED ({:.2}) as {:?}",
                request.customer_id,
                final_score,
                fraud_type
            );
        } else {
            log::debug!("customer {}: approved ({final_score:.2})", request.customer_id);
        }

        Ok(Verdict {
            status,
            risk_score: (final_score * 10_000.0).round() / 100.0,
            model_breakdown: ModelBreakdown {
                pattern: (&pattern).into(),
                anomaly: (&anomaly).into(),
                network: (&network).into(),
            },
            fraud_type,
        })
    }

    fn validate(request: &ScoreRequest) -> SentinelResult<()> {
        if !request.amount.is_finite() || request.amount < 0.0 {
            return Err(SentinelError::MalformedInput {
                reason: format!("amount must be non-negative, got {}", request.amount),
            });
        }
        if request.device_id.trim().is_empty() {
            return Err(SentinelError::MalformedInput {
                reason: "device_id is empty".into(),
            });
        }
        if request.beneficiary_account.trim().is_empty() {
            return Err(SentinelError::MalformedInput {
                reason: "beneficiary_account is empty".into(),
            });
        }
        if request.account_age_days < 0 {
            return Err(SentinelError::MalformedInput {
                reason: format!(
                    "account_age_days must be non-negative, got {}",
                    request.account_age_days
                ),
            });
        }
        Ok(())
    }

    /// The operator-facing fraud label. Network reasons take precedence
    /// over the probabilistic judges: the label changes, the block/approve
    /// decision does not.
    fn fraud_type_label(network: &NetworkFindings, anomaly: &Assessment) -> String {
        if network.score >= 1.0 {
            let star = network
                .reasons
                .iter()
                .any(|r| matches!(r, NetworkReason::MuleFanIn { .. }));
            let synthetic = network
                .reasons
                .iter()
                .any(|r| matches!(r, NetworkReason::DeviceCollision { .. }));
            let circular = network
                .reasons
                .iter()
                .any(|r| matches!(r, NetworkReason::Cycle { .. }));
            if star {
                "Star Topology".into()
            } else if synthetic {
                "Synthetic Identity".into()
            } else if circular {
                "Circular Topology".into()
            } else {
                "Network Anomaly".into()
            }
        } else if anomaly.verdict == anomaly_judge::VERDICT_SHELL {
            "Shell Entity".into()
        } else {
            "Pattern Anomaly".into()
        }
    }

    /// The only write on the scoring path: append the scored transaction,
    /// tagged with its outcome.
    fn append_scored(
        &self,
        request: &ScoreRequest,
        at: &DateTime<Utc>,
        is_fraud: bool,
        fraud_type: Option<&str>,
    ) -> SentinelResult<()> {
        let originating_account = self
            .store
            .customer_account(request.customer_id)?
            .unwrap_or_default();

        self.store.insert_transaction(&TransactionRecord {
            txn_id: Uuid::new_v4().to_string(),
            customer_id: request.customer_id,
            amount: request.amount,
            timestamp: *at,
            device_id: request.device_id.clone(),
            beneficiary_account: request.beneficiary_account.clone(),
            originating_account,
            city: request.city.clone().unwrap_or_default(),
            payment_category: request
                .payment_category
                .clone()
                .unwrap_or_else(|| DEFAULT_PAYMENT_CATEGORY.into()),
            is_fraud,
            fraud_type: fraud_type.map(String::from),
        })
    }
}
