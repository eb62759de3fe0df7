//! Baseline profiling engine.
//!
//! Batch job: reads the full transaction history and rebuilds the three
//! profile tables from scratch. Replace-on-write, never incremental —
//! every average depends on a global pass over the whole ledger, so a
//! partial update would serve inconsistent baselines. The store commits
//! the replacement in one transaction; concurrent readers see either the
//! previous profiles or the new set in full.
//!
//! A customer with no transactions gets no row. Consumers must treat a
//! missing row as "no baseline", not as an average of zero.

use crate::{
    error::SentinelResult,
    store::{
        BeneficiaryRelationshipProfile, CustomerBaselineProfile, DeviceUsageProfile,
        SentinelStore,
    },
    types::{CustomerId, Horizon, TimeBucket},
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct ProfilingRunSummary {
    pub customer_profiles: usize,
    pub relationship_profiles: usize,
    pub device_profiles: usize,
}

/// Whole days between the earliest and latest transaction, floored to 1
/// so single-day histories never divide by zero.
fn active_day_span(first: &DateTime<Utc>, last: &DateTime<Utc>) -> i64 {
    (*last - *first).num_days().max(1)
}

/// Normalized spend per horizon: total / (active_days / horizon_days),
/// with the denominator floored to 1 so short histories are not
/// extrapolated beyond their observed total.
fn horizon_average(total: f64, active_days: i64, horizon: Horizon) -> f64 {
    let periods = (active_days as f64 / horizon.days() as f64).max(1.0);
    total / periods
}

pub struct ProfilingEngine;

impl ProfilingEngine {
    /// Recompute and atomically replace all three profile tables.
    pub fn recompute(store: &SentinelStore) -> SentinelResult<ProfilingRunSummary> {
        let customers: Vec<CustomerBaselineProfile> = store
            .customer_spend_rollup()?
            .into_iter()
            .map(|r| {
                let active_days = active_day_span(&r.first_ts, &r.last_ts);
                CustomerBaselineProfile {
                    customer_id: r.customer_id,
                    grand_total: r.total,
                    active_days,
                    daily_avg: horizon_average(r.total, active_days, Horizon::Daily),
                    weekly_avg: horizon_average(r.total, active_days, Horizon::Weekly),
                    monthly_avg: horizon_average(r.total, active_days, Horizon::Monthly),
                    yearly_avg: horizon_average(r.total, active_days, Horizon::Yearly),
                }
            })
            .collect();

        let relationships: Vec<BeneficiaryRelationshipProfile> = store
            .relationship_rollup()?
            .into_iter()
            .map(|r| {
                let active_days = active_day_span(&r.first_ts, &r.last_ts);
                BeneficiaryRelationshipProfile {
                    customer_id: r.customer_id,
                    beneficiary_account: r.beneficiary_account,
                    total_amount: r.total,
                    txn_count: r.txn_count,
                    active_days,
                    daily_avg: horizon_average(r.total, active_days, Horizon::Daily),
                    weekly_avg: horizon_average(r.total, active_days, Horizon::Weekly),
                    monthly_avg: horizon_average(r.total, active_days, Horizon::Monthly),
                    yearly_avg: horizon_average(r.total, active_days, Horizon::Yearly),
                }
            })
            .collect();

        let devices = Self::build_device_profiles(store)?;

        store.replace_profiles(&customers, &relationships, &devices)?;

        let summary = ProfilingRunSummary {
            customer_profiles: customers.len(),
            relationship_profiles: relationships.len(),
            device_profiles: devices.len(),
        };
        log::info!(
            "profiling run: {} customer, {} relationship, {} device profiles",
            summary.customer_profiles,
            summary.relationship_profiles,
            summary.device_profiles
        );
        Ok(summary)
    }

    fn build_device_profiles(store: &SentinelStore) -> SentinelResult<Vec<DeviceUsageProfile>> {
        // The rollup is ordered by use count per customer, so the first
        // device seen per customer is the most used one. Ties fall to the
        // lexicographically smallest device id.
        let mut top_device: HashMap<CustomerId, String> = HashMap::new();
        for (customer_id, device_id, _uses) in store.device_usage_rollup()? {
            top_device.entry(customer_id).or_insert(device_id);
        }

        let mut buckets: HashMap<CustomerId, [i64; 4]> = HashMap::new();
        for (customer_id, hour, count) in store.hourly_usage_rollup()? {
            let slot = match TimeBucket::from_hour(hour) {
                TimeBucket::Morning => 0,
                TimeBucket::Afternoon => 1,
                TimeBucket::Evening => 2,
                TimeBucket::Night => 3,
            };
            buckets.entry(customer_id).or_default()[slot] += count;
        }

        let mut profiles: Vec<DeviceUsageProfile> = top_device
            .into_iter()
            .map(|(customer_id, device)| {
                let b = buckets.get(&customer_id).copied().unwrap_or_default();
                DeviceUsageProfile {
                    customer_id,
                    top_device: device,
                    morning_count: b[0],
                    afternoon_count: b[1],
                    evening_count: b[2],
                    night_count: b[3],
                }
            })
            .collect();
        profiles.sort_by_key(|p| p.customer_id);
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn active_days_floor_at_one() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(active_day_span(&ts, &ts), 1);

        let later = Utc.with_ymd_and_hms(2025, 3, 1, 23, 0, 0).unwrap();
        assert_eq!(active_day_span(&ts, &later), 1);
    }

    #[test]
    fn horizon_averages_scale_with_period() {
        // 20_000 spent across a 10-day span.
        assert!((horizon_average(20_000.0, 10, Horizon::Daily) - 2_000.0).abs() < 1e-6);
        assert!((horizon_average(20_000.0, 10, Horizon::Weekly) - 14_000.0).abs() < 1e-6);
        // Span shorter than the horizon: denominator floors to 1, so the
        // average is the observed total, not an extrapolation.
        assert!((horizon_average(20_000.0, 10, Horizon::Monthly) - 20_000.0).abs() < 1e-6);
        assert!((horizon_average(20_000.0, 10, Horizon::Yearly) - 20_000.0).abs() < 1e-6);
    }
}
