//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database.
//! Judges, the profiling engine and the threshold rules call store
//! methods — they never execute SQL directly.

use crate::{
    error::SentinelResult,
    types::{AccountNumber, CustomerId, DeviceId, Horizon},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

pub struct SentinelStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

// ── Row types ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CustomerRecord {
    pub customer_id: CustomerId,
    pub name: String,
    pub account_number: AccountNumber,
    pub account_open_date: DateTime<Utc>,
    pub city: String,
}

#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub txn_id: String,
    pub customer_id: CustomerId,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
    pub device_id: DeviceId,
    pub beneficiary_account: AccountNumber,
    pub originating_account: AccountNumber,
    pub city: String,
    pub payment_category: String,
    pub is_fraud: bool,
    pub fraud_type: Option<String>,
}

/// Per-customer spend baseline across the four horizons.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerBaselineProfile {
    pub customer_id: CustomerId,
    pub grand_total: f64,
    pub active_days: i64,
    pub daily_avg: f64,
    pub weekly_avg: f64,
    pub monthly_avg: f64,
    pub yearly_avg: f64,
}

impl CustomerBaselineProfile {
    pub fn average_for(&self, horizon: Horizon) -> f64 {
        match horizon {
            Horizon::Daily => self.daily_avg,
            Horizon::Weekly => self.weekly_avg,
            Horizon::Monthly => self.monthly_avg,
            Horizon::Yearly => self.yearly_avg,
        }
    }
}

/// Spend baseline scoped to one (customer, beneficiary) relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct BeneficiaryRelationshipProfile {
    pub customer_id: CustomerId,
    pub beneficiary_account: AccountNumber,
    pub total_amount: f64,
    pub txn_count: i64,
    pub active_days: i64,
    pub daily_avg: f64,
    pub weekly_avg: f64,
    pub monthly_avg: f64,
    pub yearly_avg: f64,
}

impl BeneficiaryRelationshipProfile {
    pub fn average_for(&self, horizon: Horizon) -> f64 {
        match horizon {
            Horizon::Daily => self.daily_avg,
            Horizon::Weekly => self.weekly_avg,
            Horizon::Monthly => self.monthly_avg,
            Horizon::Yearly => self.yearly_avg,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceUsageProfile {
    pub customer_id: CustomerId,
    pub top_device: DeviceId,
    pub morning_count: i64,
    pub afternoon_count: i64,
    pub evening_count: i64,
    pub night_count: i64,
}

/// Raw per-customer rollup feeding the profiling engine.
#[derive(Debug, Clone)]
pub struct CustomerSpendRollup {
    pub customer_id: CustomerId,
    pub total: f64,
    pub first_ts: DateTime<Utc>,
    pub last_ts: DateTime<Utc>,
}

/// Raw per-relationship rollup feeding the profiling engine.
#[derive(Debug, Clone)]
pub struct RelationshipRollup {
    pub customer_id: CustomerId,
    pub beneficiary_account: AccountNumber,
    pub total: f64,
    pub txn_count: i64,
    pub first_ts: DateTime<Utc>,
    pub last_ts: DateTime<Utc>,
}

/// Historical totals backing the feature extractor.
#[derive(Debug, Clone, Copy)]
pub struct CustomerHistoryTotals {
    pub total_amount: f64,
    pub opex_txn_count: i64,
    pub txn_count: i64,
}

fn parse_ts(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

impl SentinelStore {
    pub fn open(path: &str) -> SentinelResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SentinelResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database.
    /// Scoring contexts that run in parallel each take their own connection.
    /// For in-memory databases this returns a new isolated database.
    pub fn reopen(&self) -> SentinelResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SentinelResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Customer ───────────────────────────────────────────────

    pub fn insert_customer(&self, c: &CustomerRecord) -> SentinelResult<()> {
        self.conn.execute(
            "INSERT INTO customer (customer_id, name, account_number, account_open_date, city)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                c.customer_id,
                c.name,
                c.account_number,
                c.account_open_date.to_rfc3339(),
                c.city
            ],
        )?;
        Ok(())
    }

    /// The customer's own account number, if the customer is known.
    pub fn customer_account(&self, customer_id: CustomerId) -> SentinelResult<Option<AccountNumber>> {
        let account = self
            .conn
            .query_row(
                "SELECT account_number FROM customer WHERE customer_id = ?1",
                params![customer_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(account)
    }

    // ── Transaction ledger ─────────────────────────────────────

    pub fn insert_transaction(&self, t: &TransactionRecord) -> SentinelResult<()> {
        self.conn.execute(
            "INSERT INTO transactions (
                txn_id, customer_id, amount, timestamp, device_id,
                beneficiary_account, originating_account, city,
                payment_category, is_fraud, fraud_type
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                t.txn_id,
                t.customer_id,
                t.amount,
                t.timestamp.to_rfc3339(),
                t.device_id,
                t.beneficiary_account,
                t.originating_account,
                t.city,
                t.payment_category,
                if t.is_fraud { 1i32 } else { 0i32 },
                t.fraud_type.as_deref(),
            ],
        )?;
        Ok(())
    }

    pub fn txn_count_total(&self) -> SentinelResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))
            .map_err(Into::into)
    }

    pub fn latest_transaction(&self, customer_id: CustomerId) -> SentinelResult<Option<TransactionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT txn_id, customer_id, amount, timestamp, device_id,
                    beneficiary_account, originating_account, city,
                    payment_category, is_fraud, fraud_type
             FROM transactions WHERE customer_id = ?1
             ORDER BY timestamp DESC LIMIT 1",
        )?;
        let result = stmt
            .query_row(params![customer_id], |row| {
                Ok(TransactionRecord {
                    txn_id: row.get(0)?,
                    customer_id: row.get(1)?,
                    amount: row.get(2)?,
                    timestamp: parse_ts(row.get(3)?),
                    device_id: row.get(4)?,
                    beneficiary_account: row.get(5)?,
                    originating_account: row.get(6)?,
                    city: row.get(7)?,
                    payment_category: row.get(8)?,
                    is_fraud: row.get::<_, i32>(9)? != 0,
                    fraud_type: row.get(10)?,
                })
            })
            .optional()?;
        Ok(result)
    }

    // ── Feature queries ────────────────────────────────────────

    /// Historical spend total plus operating-expense transaction count.
    pub fn customer_history_totals(
        &self,
        customer_id: CustomerId,
        opex_categories: &[String],
    ) -> SentinelResult<CustomerHistoryTotals> {
        if opex_categories.is_empty() {
            let (total, count): (f64, i64) = self.conn.query_row(
                "SELECT COALESCE(SUM(amount), 0.0), COUNT(*)
                 FROM transactions WHERE customer_id = ?1",
                params![customer_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            return Ok(CustomerHistoryTotals {
                total_amount: total,
                opex_txn_count: 0,
                txn_count: count,
            });
        }

        let placeholders: Vec<String> = (0..opex_categories.len())
            .map(|i| format!("?{}", i + 2))
            .collect();
        let sql = format!(
            "SELECT COALESCE(SUM(amount), 0.0),
                    COALESCE(SUM(CASE WHEN payment_category IN ({}) THEN 1 ELSE 0 END), 0),
                    COUNT(*)
             FROM transactions WHERE customer_id = ?1",
            placeholders.join(", ")
        );

        let mut values: Vec<rusqlite::types::Value> =
            vec![rusqlite::types::Value::Integer(customer_id)];
        values.extend(
            opex_categories
                .iter()
                .map(|c| rusqlite::types::Value::Text(c.clone())),
        );

        let (total, opex, count): (f64, i64, i64) =
            self.conn
                .query_row(&sql, params_from_iter(values), |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })?;
        Ok(CustomerHistoryTotals {
            total_amount: total,
            opex_txn_count: opex,
            txn_count: count,
        })
    }

    /// Distinct customers ever observed transacting from this device.
    pub fn distinct_users_on_device(&self, device_id: &str) -> SentinelResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(DISTINCT customer_id) FROM transactions WHERE device_id = ?1",
                params![device_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    // ── Network topology queries ───────────────────────────────

    /// Distinct senders into `beneficiary_account` since `since`,
    /// excluding the live sender (counted separately by the caller).
    pub fn fan_in_senders_since(
        &self,
        beneficiary_account: &str,
        since: &DateTime<Utc>,
        exclude_customer: CustomerId,
    ) -> SentinelResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(DISTINCT customer_id)
                 FROM transactions
                 WHERE beneficiary_account = ?1
                   AND timestamp > ?2
                   AND customer_id != ?3",
                params![beneficiary_account, since.to_rfc3339(), exclude_customer],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// Distinct accounts this account has ever sent funds to.
    pub fn outbound_beneficiaries(&self, account: &str) -> SentinelResult<Vec<AccountNumber>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT beneficiary_account
             FROM transactions WHERE originating_account = ?1",
        )?;
        let accounts = stmt
            .query_map(params![account], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    // ── Profiling rollups ──────────────────────────────────────

    pub fn customer_spend_rollup(&self) -> SentinelResult<Vec<CustomerSpendRollup>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, SUM(amount), MIN(timestamp), MAX(timestamp)
             FROM transactions GROUP BY customer_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(CustomerSpendRollup {
                    customer_id: row.get(0)?,
                    total: row.get(1)?,
                    first_ts: parse_ts(row.get(2)?),
                    last_ts: parse_ts(row.get(3)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn relationship_rollup(&self) -> SentinelResult<Vec<RelationshipRollup>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, beneficiary_account, SUM(amount), COUNT(*),
                    MIN(timestamp), MAX(timestamp)
             FROM transactions GROUP BY customer_id, beneficiary_account",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RelationshipRollup {
                    customer_id: row.get(0)?,
                    beneficiary_account: row.get(1)?,
                    total: row.get(2)?,
                    txn_count: row.get(3)?,
                    first_ts: parse_ts(row.get(4)?),
                    last_ts: parse_ts(row.get(5)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Transaction counts per (customer, device), ordered so the first
    /// row per customer is that customer's most used device.
    pub fn device_usage_rollup(&self) -> SentinelResult<Vec<(CustomerId, DeviceId, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, device_id, COUNT(*) AS uses
             FROM transactions
             GROUP BY customer_id, device_id
             ORDER BY customer_id ASC, uses DESC, device_id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Transaction counts per (customer, hour of day).
    pub fn hourly_usage_rollup(&self) -> SentinelResult<Vec<(CustomerId, u32, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, CAST(strftime('%H', timestamp) AS INTEGER), COUNT(*)
             FROM transactions
             GROUP BY customer_id, strftime('%H', timestamp)",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get::<_, i64>(1)? as u32, row.get(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Profile tables ─────────────────────────────────────────

    /// Replace all three profile tables in one transaction.
    ///
    /// Readers on other connections see either the previous profiles or
    /// the new ones in full, never a half-built table.
    pub fn replace_profiles(
        &self,
        customers: &[CustomerBaselineProfile],
        relationships: &[BeneficiaryRelationshipProfile],
        devices: &[DeviceUsageProfile],
    ) -> SentinelResult<()> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute("DELETE FROM profile_customer", [])?;
        tx.execute("DELETE FROM profile_beneficiary", [])?;
        tx.execute("DELETE FROM profile_device_usage", [])?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO profile_customer (
                    customer_id, grand_total, active_days,
                    daily_avg, weekly_avg, monthly_avg, yearly_avg
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for p in customers {
                stmt.execute(params![
                    p.customer_id,
                    p.grand_total,
                    p.active_days,
                    p.daily_avg,
                    p.weekly_avg,
                    p.monthly_avg,
                    p.yearly_avg,
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO profile_beneficiary (
                    customer_id, beneficiary_account, total_amount, txn_count,
                    active_days, daily_avg, weekly_avg, monthly_avg, yearly_avg
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for p in relationships {
                stmt.execute(params![
                    p.customer_id,
                    p.beneficiary_account,
                    p.total_amount,
                    p.txn_count,
                    p.active_days,
                    p.daily_avg,
                    p.weekly_avg,
                    p.monthly_avg,
                    p.yearly_avg,
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO profile_device_usage (
                    customer_id, top_device,
                    morning_count, afternoon_count, evening_count, night_count
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for p in devices {
                stmt.execute(params![
                    p.customer_id,
                    p.top_device,
                    p.morning_count,
                    p.afternoon_count,
                    p.evening_count,
                    p.night_count,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    pub fn customer_profile(
        &self,
        customer_id: CustomerId,
    ) -> SentinelResult<Option<CustomerBaselineProfile>> {
        let profile = self
            .conn
            .query_row(
                "SELECT customer_id, grand_total, active_days,
                        daily_avg, weekly_avg, monthly_avg, yearly_avg
                 FROM profile_customer WHERE customer_id = ?1",
                params![customer_id],
                |row| {
                    Ok(CustomerBaselineProfile {
                        customer_id: row.get(0)?,
                        grand_total: row.get(1)?,
                        active_days: row.get(2)?,
                        daily_avg: row.get(3)?,
                        weekly_avg: row.get(4)?,
                        monthly_avg: row.get(5)?,
                        yearly_avg: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    pub fn relationship_profile(
        &self,
        customer_id: CustomerId,
        beneficiary_account: &str,
    ) -> SentinelResult<Option<BeneficiaryRelationshipProfile>> {
        let profile = self
            .conn
            .query_row(
                "SELECT customer_id, beneficiary_account, total_amount, txn_count,
                        active_days, daily_avg, weekly_avg, monthly_avg, yearly_avg
                 FROM profile_beneficiary
                 WHERE customer_id = ?1 AND beneficiary_account = ?2",
                params![customer_id, beneficiary_account],
                |row| {
                    Ok(BeneficiaryRelationshipProfile {
                        customer_id: row.get(0)?,
                        beneficiary_account: row.get(1)?,
                        total_amount: row.get(2)?,
                        txn_count: row.get(3)?,
                        active_days: row.get(4)?,
                        daily_avg: row.get(5)?,
                        weekly_avg: row.get(6)?,
                        monthly_avg: row.get(7)?,
                        yearly_avg: row.get(8)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    pub fn device_profile(
        &self,
        customer_id: CustomerId,
    ) -> SentinelResult<Option<DeviceUsageProfile>> {
        let profile = self
            .conn
            .query_row(
                "SELECT customer_id, top_device,
                        morning_count, afternoon_count, evening_count, night_count
                 FROM profile_device_usage WHERE customer_id = ?1",
                params![customer_id],
                |row| {
                    Ok(DeviceUsageProfile {
                        customer_id: row.get(0)?,
                        top_device: row.get(1)?,
                        morning_count: row.get(2)?,
                        afternoon_count: row.get(3)?,
                        evening_count: row.get(4)?,
                        night_count: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    pub fn customer_profile_count(&self) -> SentinelResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM profile_customer", [], |row| row.get(0))
            .map_err(Into::into)
    }

    pub fn relationship_profile_count(&self) -> SentinelResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM profile_beneficiary", [], |row| {
                row.get(0)
            })
            .map_err(Into::into)
    }

    pub fn device_profile_count(&self) -> SentinelResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM profile_device_usage", [], |row| {
                row.get(0)
            })
            .map_err(Into::into)
    }
}
