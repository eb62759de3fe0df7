//! Network judge — graph topology checks over the live ledger.
//!
//! The most expensive judge: it queries the transaction store directly
//! rather than the precomputed baselines. Three independent checks run
//! per transaction; a store failure in one check degrades that check
//! only and the judge still answers.
//!
//! The outcome is binary: any fired check collapses the score to
//! exactly 1.0, which the aggregator treats as a veto.

use crate::{
    config::NetworkConfig,
    store::SentinelStore,
    types::{AccountNumber, CustomerId},
};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::fmt;

pub const VERDICT_RISK: &str = "Network Topology Risk";
pub const VERDICT_CLEAN: &str = "Clean";

/// A fired topology check. The aggregator inspects the variant to pick
/// the fraud-type label; the Display form feeds the response details.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkReason {
    DeviceCollision {
        device_id: String,
        users: i64,
    },
    MuleFanIn {
        beneficiary_account: AccountNumber,
        senders: i64,
    },
    Cycle {
        /// The discovered loop, origin first and last.
        path: Vec<AccountNumber>,
    },
}

impl fmt::Display for NetworkReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceCollision { device_id, users } => {
                write!(f, "Device Collision: {users} identities on device '{device_id}'")
            }
            Self::MuleFanIn {
                beneficiary_account,
                senders,
            } => write!(
                f,
                "Mule Node: '{beneficiary_account}' receiving from {senders} sources"
            ),
            Self::Cycle { path } => {
                write!(f, "Cycle Detected: {}", path.join(" -> "))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct NetworkFindings {
    /// Exactly 0.0 or 1.0, never intermediate.
    pub score: f64,
    pub verdict: String,
    pub reasons: Vec<NetworkReason>,
    /// True when at least one check could not run against the store.
    pub degraded: bool,
}

pub struct NetworkJudge {
    config: NetworkConfig,
}

impl NetworkJudge {
    pub fn new(config: NetworkConfig) -> Self {
        Self { config }
    }

    /// Run the three topology checks for a proposed transaction.
    ///
    /// `at` is the effective transaction time; the fan-in window trails it.
    pub fn investigate(
        &self,
        store: &SentinelStore,
        device_id: &str,
        customer_id: CustomerId,
        beneficiary_account: &str,
        at: &DateTime<Utc>,
    ) -> NetworkFindings {
        let mut reasons = Vec::new();
        let mut degraded = false;

        // 1. Synthetic identity: distinct customers sharing the device.
        match store.distinct_users_on_device(device_id) {
            Ok(users) if users > self.config.device_collision_threshold => {
                log::warn!("network judge: device collision on '{device_id}' ({users} users)");
                reasons.push(NetworkReason::DeviceCollision {
                    device_id: device_id.to_string(),
                    users,
                });
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("network judge: device check failed ({e})");
                degraded = true;
            }
        }

        // 2. Money mule: fan-in to the beneficiary in the trailing window.
        //    The live sender counts toward the total.
        let since = *at - Duration::hours(self.config.fan_in_window_hours);
        match store.fan_in_senders_since(beneficiary_account, &since, customer_id) {
            Ok(others) => {
                let senders = others + 1;
                if senders >= self.config.fan_in_threshold {
                    log::warn!(
                        "network judge: mule fan-in on '{beneficiary_account}' ({senders} senders)"
                    );
                    reasons.push(NetworkReason::MuleFanIn {
                        beneficiary_account: beneficiary_account.to_string(),
                        senders,
                    });
                }
            }
            Err(e) => {
                log::warn!("network judge: fan-in check failed ({e})");
                degraded = true;
            }
        }

        // 3. Circular routing: bounded-depth search from the beneficiary
        //    back to the customer's own account. An unknown customer has
        //    no origin to close a loop on, so the check is skipped.
        match store.customer_account(customer_id) {
            Ok(Some(origin)) if origin != beneficiary_account => {
                match self.find_cycle(store, beneficiary_account, &origin) {
                    Ok(Some(path)) => {
                        log::warn!("network judge: cycle {}", path.join(" -> "));
                        reasons.push(NetworkReason::Cycle { path });
                    }
                    Ok(None) => {}
                    Err(e) => {
                        log::warn!("network judge: cycle check failed ({e})");
                        degraded = true;
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("network judge: origin lookup failed ({e})");
                degraded = true;
            }
        }

        if reasons.is_empty() {
            NetworkFindings {
                score: 0.0,
                verdict: VERDICT_CLEAN.to_string(),
                reasons,
                degraded,
            }
        } else {
            NetworkFindings {
                score: 1.0,
                verdict: VERDICT_RISK.to_string(),
                reasons,
                degraded,
            }
        }
    }

    /// Depth-bounded DFS over distinct outbound edges, looking for a path
    /// from `start` back to `target`. The live hop A->B is the first edge
    /// of the cycle, so the search may take up to `max_cycle_depth - 1`
    /// further hops.
    fn find_cycle(
        &self,
        store: &SentinelStore,
        start: &str,
        target: &str,
    ) -> crate::error::SentinelResult<Option<Vec<AccountNumber>>> {
        let hops_left = self.config.max_cycle_depth.saturating_sub(1);
        if hops_left == 0 {
            return Ok(None);
        }
        let mut visited: HashSet<AccountNumber> = HashSet::new();
        visited.insert(start.to_string());
        let mut path = vec![target.to_string(), start.to_string()];
        if Self::dfs(store, start, target, hops_left, &mut visited, &mut path)? {
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }

    fn dfs(
        store: &SentinelStore,
        current: &str,
        target: &str,
        hops_left: usize,
        visited: &mut HashSet<AccountNumber>,
        path: &mut Vec<AccountNumber>,
    ) -> crate::error::SentinelResult<bool> {
        for next in store.outbound_beneficiaries(current)? {
            if next == target {
                path.push(next);
                return Ok(true);
            }
            if hops_left > 1 && visited.insert(next.clone()) {
                path.push(next.clone());
                if Self::dfs(store, &next, target, hops_left - 1, visited, path)? {
                    return Ok(true);
                }
                path.pop();
            }
        }
        Ok(false)
    }
}
