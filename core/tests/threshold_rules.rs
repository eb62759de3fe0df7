//! Threshold rule simulator tests: multiplier breaches, horizon
//! selection, and default limits for unprofiled entities.

use chrono::{DateTime, Duration, TimeZone, Utc};
use sentinel_core::config::SentinelConfig;
use sentinel_core::ensemble::VerdictStatus;
use sentinel_core::profiling::ProfilingEngine;
use sentinel_core::store::{SentinelStore, TransactionRecord};
use sentinel_core::threshold_rules::ThresholdSimulator;
use sentinel_core::types::Horizon;
use std::sync::atomic::{AtomicU64, Ordering};

static TXN_SEQ: AtomicU64 = AtomicU64::new(0);

fn store() -> SentinelStore {
    let store = SentinelStore::in_memory().unwrap();
    store.migrate().unwrap();
    store
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap()
}

fn add_txn(store: &SentinelStore, customer_id: i64, amount: f64, ts: DateTime<Utc>, beneficiary: &str) {
    let n = TXN_SEQ.fetch_add(1, Ordering::Relaxed);
    store
        .insert_transaction(&TransactionRecord {
            txn_id: format!("t-{n}"),
            customer_id,
            amount,
            timestamp: ts,
            device_id: "D1".into(),
            beneficiary_account: beneficiary.into(),
            originating_account: format!("ACC-{customer_id}"),
            city: "Mumbai".into(),
            payment_category: "Transfer".into(),
            is_fraud: false,
            fraud_type: None,
        })
        .unwrap();
}

/// Customer 1 with a daily average of exactly 2000 (20k over 10 days).
fn profiled_store() -> SentinelStore {
    let store = store();
    add_txn(&store, 1, 8_000.0, base_time(), "B-1");
    add_txn(&store, 1, 12_000.0, base_time() + Duration::days(10), "B-1");
    ProfilingEngine::recompute(&store).unwrap();
    store
}

#[test]
fn daily_breach_blocks_and_cites_the_limit() {
    let store = profiled_store();
    let config = SentinelConfig::default().threshold_rules;
    let sim = ThresholdSimulator::new(&store, config);

    let breach = sim.check_customer(1, 4_500.0, Horizon::Daily).unwrap();
    assert_eq!(breach.status, VerdictStatus::Blocked);
    assert!((breach.threshold - 4_000.0).abs() < 1e-9);
    assert!(breach.message.contains("Daily"));
    assert!(breach.message.contains("4000.00"));

    let within = sim.check_customer(1, 3_500.0, Horizon::Daily).unwrap();
    assert_eq!(within.status, VerdictStatus::Approved);
    assert!((within.threshold - 4_000.0).abs() < 1e-9);
}

#[test]
fn weekly_horizon_uses_the_weekly_average() {
    let store = profiled_store();
    let sim = ThresholdSimulator::new(&store, SentinelConfig::default().threshold_rules);

    // weekly_avg = 14_000, threshold = 28_000.
    let within = sim.check_customer(1, 27_000.0, Horizon::Weekly).unwrap();
    assert_eq!(within.status, VerdictStatus::Approved);

    let breach = sim.check_customer(1, 29_000.0, Horizon::Weekly).unwrap();
    assert_eq!(breach.status, VerdictStatus::Blocked);
}

#[test]
fn missing_customer_profile_falls_back_to_the_low_default() {
    let store = store();
    ProfilingEngine::recompute(&store).unwrap();
    let sim = ThresholdSimulator::new(&store, SentinelConfig::default().threshold_rules);

    // No profile row: default average 1000, threshold 2000.
    let breach = sim.check_customer(42, 2_500.0, Horizon::Daily).unwrap();
    assert_eq!(breach.status, VerdictStatus::Blocked);
    assert!((breach.threshold - 2_000.0).abs() < 1e-9);

    let within = sim.check_customer(42, 1_500.0, Horizon::Monthly).unwrap();
    assert_eq!(within.status, VerdictStatus::Approved);
}

#[test]
fn missing_relationship_profile_uses_its_own_default() {
    let store = store();
    ProfilingEngine::recompute(&store).unwrap();
    let sim = ThresholdSimulator::new(&store, SentinelConfig::default().threshold_rules);

    // Relationship default average 5000, threshold 10_000.
    let within = sim
        .check_relationship(42, "B-UNKNOWN", 9_000.0, Horizon::Daily)
        .unwrap();
    assert_eq!(within.status, VerdictStatus::Approved);

    let breach = sim
        .check_relationship(42, "B-UNKNOWN", 11_000.0, Horizon::Daily)
        .unwrap();
    assert_eq!(breach.status, VerdictStatus::Blocked);
}

#[test]
fn relationship_check_is_scoped_to_the_pair() {
    let store = store();
    // 3000 to B-1 over 3 days (daily avg 1000), plus a fat pipe to B-2.
    add_txn(&store, 1, 1_000.0, base_time(), "B-1");
    add_txn(&store, 1, 2_000.0, base_time() + Duration::days(3), "B-1");
    add_txn(&store, 1, 90_000.0, base_time(), "B-2");
    ProfilingEngine::recompute(&store).unwrap();
    let sim = ThresholdSimulator::new(&store, SentinelConfig::default().threshold_rules);

    // B-1 daily avg 1000 -> threshold 2000; the B-2 volume must not leak in.
    let breach = sim
        .check_relationship(1, "B-1", 2_500.0, Horizon::Daily)
        .unwrap();
    assert_eq!(breach.status, VerdictStatus::Blocked);
}

#[test]
fn multiplier_is_configurable() {
    let store = profiled_store();
    let mut config = SentinelConfig::default().threshold_rules;
    config.multiplier = 2.5;
    let sim = ThresholdSimulator::new(&store, config);

    // Daily avg 2000 x 2.5 = 5000: the 4500 that breaches at 2.0 passes.
    let decision = sim.check_customer(1, 4_500.0, Horizon::Daily).unwrap();
    assert_eq!(decision.status, VerdictStatus::Approved);
    assert!((decision.threshold - 5_000.0).abs() < 1e-9);
}
