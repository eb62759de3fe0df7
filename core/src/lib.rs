//! sentinel-core — the FinSentinel fraud risk ensemble engine.
//!
//! One transaction in, one verdict out. Three judges score independently
//! against behavioral baselines recomputed from the transaction ledger:
//!
//!   1. Pattern judge  — supervised probability + structuring/bust-out rules
//!   2. Anomaly judge  — distribution deviation + shell-entity rule
//!   3. Network judge  — live graph topology checks (collisions, mules, cycles)
//!
//! The ensemble fuses the three scores with veto semantics and appends the
//! scored transaction back to the ledger.
//!
//! RULES:
//!   - Only store.rs talks to the database. Judges call store methods.
//!   - Judges never mutate shared state; the ensemble's append is the only
//!     write on the scoring path.
//!   - The profiling engine owns the profile tables and replaces them
//!     atomically; everything else only reads them.

pub mod anomaly_judge;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod features;
pub mod judge;
pub mod model;
pub mod network_judge;
pub mod pattern_judge;
pub mod profiling;
pub mod store;
pub mod threshold_rules;
pub mod types;
