//! Live feature extraction.
//!
//! Derives the four-feature vector the pattern and anomaly judges consume.
//! Lookups fail open: a store error or a customer with no history yields
//! the documented neutral defaults instead of failing the request, so a
//! degraded database can still produce verdicts.

use crate::{
    store::SentinelStore,
    types::{CustomerId, DeviceId},
};
use serde::Serialize;

/// Neutral opex ratio used when history is missing or unreadable.
const NEUTRAL_OPEX_RATIO: f64 = 0.5;

/// Ephemeral per-request feature vector. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureVector {
    pub amount: f64,
    /// Fraction of historical activity in operating-expense categories,
    /// in [0, 1]. Low values on high volume suggest a shell entity.
    pub opex_ratio: f64,
    /// Distinct customers observed on the submitting device, >= 1.
    pub users_on_device: i64,
    pub account_age_days: i64,
}

impl FeatureVector {
    /// Fixed feature order shared with the model artifacts.
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.amount,
            self.opex_ratio,
            self.users_on_device as f64,
            self.account_age_days as f64,
        ]
    }
}

pub struct FeatureExtractor<'a> {
    store: &'a SentinelStore,
    opex_categories: &'a [String],
}

impl<'a> FeatureExtractor<'a> {
    pub fn new(store: &'a SentinelStore, opex_categories: &'a [String]) -> Self {
        Self {
            store,
            opex_categories,
        }
    }

    /// Build the feature vector for a proposed transaction.
    ///
    /// The proposed amount participates in the opex denominator; the "+1"
    /// keeps it finite for empty histories and biases brand-new customers
    /// toward zero.
    pub fn extract(
        &self,
        customer_id: CustomerId,
        amount: f64,
        device_id: &DeviceId,
        account_age_days: i64,
    ) -> FeatureVector {
        let opex_ratio = match self
            .store
            .customer_history_totals(customer_id, self.opex_categories)
        {
            Ok(totals) if totals.txn_count == 0 => NEUTRAL_OPEX_RATIO,
            Ok(totals) => {
                let ratio =
                    totals.opex_txn_count as f64 / (totals.total_amount + amount + 1.0);
                ratio.clamp(0.0, 1.0)
            }
            Err(e) => {
                log::warn!("customer {customer_id}: history lookup failed ({e}), using neutral opex ratio");
                NEUTRAL_OPEX_RATIO
            }
        };

        let users_on_device = match self.store.distinct_users_on_device(device_id) {
            Ok(count) => count.max(1),
            Err(e) => {
                log::warn!("device {device_id}: usage lookup failed ({e}), assuming single user");
                1
            }
        };

        FeatureVector {
            amount,
            opex_ratio,
            users_on_device,
            account_age_days: account_age_days.max(0),
        }
    }
}
