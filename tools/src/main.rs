//! sentinel-runner: headless demo runner for the FinSentinel core.
//!
//! Seeds a deterministic synthetic population and transaction history,
//! injects the classic attack topologies, recomputes the baselines, and
//! scores one transaction per scenario end to end.
//!
//! Usage:
//!   sentinel-runner --seed 42 --customers 30 --db sentinel.db
//!
//! RULE: nothing here calls a platform RNG. All randomness flows through
//! the single Pcg64Mcg stream derived from --seed, so two runs with the
//! same seed produce the same ledger.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use sentinel_core::{
    config::SentinelConfig,
    ensemble::{RiskEnsemble, ScoreRequest},
    model::{DeviationModel, FeatureScaling, LogisticModel},
    profiling::ProfilingEngine,
    store::{CustomerRecord, SentinelStore, TransactionRecord},
    threshold_rules::ThresholdSimulator,
    types::Horizon,
};
use std::env;

const CITIES: &[&str] = &["Mumbai", "Pune", "Delhi", "Chennai", "Kolkata"];
const DEVICES: &[&str] = &["Android", "iOS", "Windows", "MacOS"];
const CATEGORIES: &[&str] = &[
    "Transfer",
    "Rent",
    "Utilities",
    "Electricity Bill",
    "Groceries",
    "Shopping",
    "Travel",
];

const SHARED_DEVICE: &str = "Android_Pixel_Shared_99";
const MULE_ACCOUNT: &str = "MULE-ACC-001";

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let customers = parse_arg(&args, "--customers", 30usize);
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or(":memory:");

    println!("FinSentinel — sentinel-runner");
    println!("  seed:      {seed}");
    println!("  customers: {customers}");
    println!("  db:        {db}");
    println!();

    let store = if db == ":memory:" {
        SentinelStore::in_memory()?
    } else {
        SentinelStore::open(db)?
    };
    store.migrate()?;

    let config = SentinelConfig::load("data/sentinel.json").unwrap_or_else(|e| {
        log::info!("using default config ({e})");
        SentinelConfig::default()
    });
    write_default_artifacts(&config)?;

    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    let now = Utc::now();
    seed_population(&store, &mut rng, customers, &now)?;
    seed_attack_topologies(&store, &now)?;

    let summary = ProfilingEngine::recompute(&store)?;
    println!(
        "Profiling run: {} customer, {} relationship, {} device profiles",
        summary.customer_profiles, summary.relationship_profiles, summary.device_profiles
    );
    println!("Ledger rows: {}", store.txn_count_total()?);
    println!();

    run_threshold_demo(&store, &config)?;

    let ensemble = RiskEnsemble::new(store, config);
    for (label, request) in scenarios(&now) {
        let verdict = ensemble.score(&request)?;
        println!("── {label} ──");
        println!("{}", serde_json::to_string_pretty(&verdict)?);
        println!();
    }

    Ok(())
}

/// Write the demo model artifacts if they are not already present, so a
/// fresh checkout scores with live models instead of degraded judges.
fn write_default_artifacts(config: &SentinelConfig) -> Result<()> {
    let scaling = FeatureScaling {
        means: [9_500.0, 0.4, 1.2, 900.0],
        stds: [6_000.0, 0.25, 0.8, 600.0],
    };
    if !std::path::Path::new(&config.pattern_model_path).exists() {
        if let Some(dir) = std::path::Path::new(&config.pattern_model_path).parent() {
            std::fs::create_dir_all(dir)?;
        }
        let model = LogisticModel {
            scaling: scaling.clone(),
            weights: [1.6, -1.1, 1.2, -0.8],
            bias: -2.4,
        };
        std::fs::write(
            &config.pattern_model_path,
            serde_json::to_string_pretty(&model)?,
        )?;
        log::info!("wrote {}", config.pattern_model_path);
    }
    if !std::path::Path::new(&config.anomaly_model_path).exists() {
        if let Some(dir) = std::path::Path::new(&config.anomaly_model_path).parent() {
            std::fs::create_dir_all(dir)?;
        }
        let model = DeviationModel {
            scaling,
            offset: 1.8,
        };
        std::fs::write(
            &config.anomaly_model_path,
            serde_json::to_string_pretty(&model)?,
        )?;
        log::info!("wrote {}", config.anomaly_model_path);
    }
    Ok(())
}

fn seed_population(
    store: &SentinelStore,
    rng: &mut Pcg64Mcg,
    customers: usize,
    now: &DateTime<Utc>,
) -> Result<()> {
    let mut txn_seq = 0u64;
    for i in 0..customers {
        let customer_id = 1_000 + i as i64;
        let account = format!("ACC-{customer_id}");
        let city = CITIES[rng.gen_range(0..CITIES.len())];
        store.insert_customer(&CustomerRecord {
            customer_id,
            name: format!("Customer {customer_id}"),
            account_number: account.clone(),
            account_open_date: *now - Duration::days(rng.gen_range(400..3_000)),
            city: city.into(),
        })?;

        // One device per customer; only the injected SHARED_DEVICE collides.
        let device = format!(
            "{}-{customer_id}",
            DEVICES[rng.gen_range(0..DEVICES.len())]
        );
        let history_len = rng.gen_range(40..120);
        for _ in 0..history_len {
            let age_days = rng.gen_range(1..365);
            let category = CATEGORIES[rng.gen_range(0..CATEGORIES.len())];
            store.insert_transaction(&TransactionRecord {
                txn_id: format!("seed-{customer_id}-{txn_seq}"),
                customer_id,
                amount: 200.0 + rng.gen_range(0.0..15_000.0),
                timestamp: *now - Duration::days(age_days) - Duration::hours(rng.gen_range(0..24)),
                device_id: device.clone(),
                beneficiary_account: format!("BEN-{}", rng.gen_range(2_000..2_400)),
                originating_account: account.clone(),
                city: city.into(),
                payment_category: category.into(),
                is_fraud: false,
                fraud_type: None,
            })?;
            txn_seq += 1;
        }
    }
    Ok(())
}

/// History rows that set up each attack scenario the demo scores against.
fn seed_attack_topologies(store: &SentinelStore, now: &DateTime<Utc>) -> Result<()> {
    // Synthetic identity: four seeded customers share one device.
    for (i, customer_id) in (1_000..1_004).enumerate() {
        store.insert_transaction(&TransactionRecord {
            txn_id: format!("shared-{customer_id}"),
            customer_id,
            amount: 900.0,
            timestamp: *now - Duration::days(3 + i as i64),
            device_id: SHARED_DEVICE.into(),
            beneficiary_account: format!("BEN-{}", 2_000 + i),
            originating_account: format!("ACC-{customer_id}"),
            city: "Mumbai".into(),
            payment_category: "Transfer".into(),
            is_fraud: false,
            fraud_type: None,
        })?;
    }

    // Star topology: four distinct senders into the mule in the last day.
    for (i, customer_id) in (1_004..1_008).enumerate() {
        store.insert_transaction(&TransactionRecord {
            txn_id: format!("mule-{customer_id}"),
            customer_id,
            amount: 4_000.0,
            timestamp: *now - Duration::hours(2 * (i as i64 + 1)),
            device_id: format!("Android-{customer_id}"),
            beneficiary_account: MULE_ACCOUNT.into(),
            originating_account: format!("ACC-{customer_id}"),
            city: "Pune".into(),
            payment_category: "Transfer".into(),
            is_fraud: false,
            fraud_type: None,
        })?;
    }

    // Layering: ACC-1010 -> ACC-1011 -> ACC-1009, so a live transaction
    // from customer 1009 to ACC-1010 closes a three-hop loop.
    store.insert_transaction(&TransactionRecord {
        txn_id: "layer-1".into(),
        customer_id: 1_010,
        amount: 7_500.0,
        timestamp: *now - Duration::days(2),
        device_id: "iOS-1010".into(),
        beneficiary_account: "ACC-1011".into(),
        originating_account: "ACC-1010".into(),
        city: "Delhi".into(),
        payment_category: "Transfer".into(),
        is_fraud: false,
        fraud_type: None,
    })?;
    store.insert_transaction(&TransactionRecord {
        txn_id: "layer-2".into(),
        customer_id: 1_011,
        amount: 7_200.0,
        timestamp: *now - Duration::days(1),
        device_id: "iOS-1011".into(),
        beneficiary_account: "ACC-1009".into(),
        originating_account: "ACC-1011".into(),
        city: "Delhi".into(),
        payment_category: "Transfer".into(),
        is_fraud: false,
        fraud_type: None,
    })?;

    Ok(())
}

fn scenarios(now: &DateTime<Utc>) -> Vec<(&'static str, ScoreRequest)> {
    let at = Some(*now);
    vec![
        (
            "Baseline: routine transfer",
            ScoreRequest {
                customer_id: 1_015,
                amount: 3_500.0,
                device_id: "Android-1015".into(),
                beneficiary_account: "BEN-2100".into(),
                account_age_days: 800,
                timestamp: at,
                city: None,
                payment_category: None,
            },
        ),
        (
            "Synthetic identity: fifth user on a shared device",
            ScoreRequest {
                customer_id: 1_020,
                amount: 5_000.0,
                device_id: SHARED_DEVICE.into(),
                beneficiary_account: "BEN-2200".into(),
                account_age_days: 700,
                timestamp: at,
                city: None,
                payment_category: None,
            },
        ),
        (
            "Star topology: fifth sender into the mule",
            ScoreRequest {
                customer_id: 1_021,
                amount: 4_500.0,
                device_id: "iOS-1021".into(),
                beneficiary_account: MULE_ACCOUNT.into(),
                account_age_days: 650,
                timestamp: at,
                city: None,
                payment_category: None,
            },
        ),
        (
            "Circular topology: closing a three-hop loop",
            ScoreRequest {
                customer_id: 1_009,
                amount: 8_000.0,
                device_id: "iOS-1009".into(),
                beneficiary_account: "ACC-1010".into(),
                account_age_days: 900,
                timestamp: at,
                city: None,
                payment_category: None,
            },
        ),
        (
            "Bust-out: five-day-old account, large spend",
            ScoreRequest {
                customer_id: 1_022,
                amount: 75_000.0,
                device_id: "Windows-1022".into(),
                beneficiary_account: "BEN-2300".into(),
                account_age_days: 2,
                timestamp: at,
                city: None,
                payment_category: None,
            },
        ),
        (
            "Shell entity: huge volume, zero operating expense",
            ScoreRequest {
                customer_id: 1_023,
                amount: 250_000.0,
                device_id: "MacOS-1023".into(),
                beneficiary_account: "BEN-2400".into(),
                account_age_days: 400,
                timestamp: at,
                city: None,
                payment_category: None,
            },
        ),
    ]
}

fn run_threshold_demo(store: &SentinelStore, config: &SentinelConfig) -> Result<()> {
    let sim = ThresholdSimulator::new(store, config.threshold_rules.clone());
    for horizon in [Horizon::Daily, Horizon::Weekly] {
        let decision = sim.check_customer(1_000, 25_000.0, horizon)?;
        println!(
            "Threshold check [{}] 25000.00 -> {:?}: {}",
            horizon.label(),
            decision.status,
            decision.message
        );
    }
    println!();
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
