//! Threshold rule simulators.
//!
//! Simple multiplier-based breach rules over the precomputed baselines.
//! Not part of the three-judge ensemble — these share only the profile
//! data contract. A customer or relationship with no profile row gets a
//! fixed low default limit instead of a hard block, so brand-new
//! entities can still transact.

use crate::{
    config::ThresholdRuleConfig,
    ensemble::VerdictStatus,
    error::SentinelResult,
    store::SentinelStore,
    types::{CustomerId, Horizon},
};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ThresholdDecision {
    pub status: VerdictStatus,
    pub message: String,
    pub threshold: f64,
}

pub struct ThresholdSimulator<'a> {
    store: &'a SentinelStore,
    config: ThresholdRuleConfig,
}

impl<'a> ThresholdSimulator<'a> {
    pub fn new(store: &'a SentinelStore, config: ThresholdRuleConfig) -> Self {
        Self { store, config }
    }

    /// Check an amount against the customer's own horizon average.
    pub fn check_customer(
        &self,
        customer_id: CustomerId,
        amount: f64,
        horizon: Horizon,
    ) -> SentinelResult<ThresholdDecision> {
        let average = self
            .store
            .customer_profile(customer_id)?
            .map(|p| p.average_for(horizon))
            .unwrap_or(self.config.customer_default_avg);
        Ok(self.decide(amount, average, horizon))
    }

    /// Check an amount against one (customer, beneficiary) relationship.
    pub fn check_relationship(
        &self,
        customer_id: CustomerId,
        beneficiary_account: &str,
        amount: f64,
        horizon: Horizon,
    ) -> SentinelResult<ThresholdDecision> {
        let average = self
            .store
            .relationship_profile(customer_id, beneficiary_account)?
            .map(|p| p.average_for(horizon))
            .unwrap_or(self.config.relationship_default_avg);
        Ok(self.decide(amount, average, horizon))
    }

    fn decide(&self, amount: f64, average: f64, horizon: Horizon) -> ThresholdDecision {
        let threshold = average * self.config.multiplier;
        if amount > threshold {
            ThresholdDecision {
                status: VerdictStatus::Blocked,
                message: format!(
                    "{} limit breached: {amount:.2} exceeds {threshold:.2} ({}x the {} average of {average:.2})",
                    horizon.label(),
                    self.config.multiplier,
                    horizon.label().to_lowercase(),
                ),
                threshold,
            }
        } else {
            ThresholdDecision {
                status: VerdictStatus::Approved,
                message: format!(
                    "Within the {} limit of {threshold:.2}",
                    horizon.label()
                ),
                threshold,
            }
        }
    }
}
