//! SQLite Credit Ledger
//!
//! Balances, grants and usage entries stored in the local database.
//!
//! The debit is a conditional decrement executed in the same transaction as
//! the audit insert:
//!
//! ```sql
//! UPDATE credit_accounts SET balance = balance - :cost
//! WHERE user_id = :user AND balance >= :cost
//! ```
//!
//! Two attempts that both passed the credit check against the same balance
//! can therefore never overdraw it. The attempt that loses is still audited,
//! with `debited = 0`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::ledger::{CreditLedger, SubscriptionInfo, UsageRecord};
use crate::constants::ledger as ledger_constants;
use crate::storage::SharedDatabase;
use crate::types::{LoomError, Result, ResultExt, UserId};

/// A stored usage entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageEntry {
    pub id: String,
    pub feature_type: String,
    pub provider: String,
    pub model: String,
    pub prompt_length: i64,
    pub total_cost: i64,
    pub success: bool,
    pub error_message: Option<String>,
    pub debited: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct LocalLedger {
    db: SharedDatabase,
}

impl LocalLedger {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// Add credits to a user's balance, creating the account if needed.
    /// Returns the new balance.
    pub fn grant_credits(&self, user: &UserId, amount: u32, reason: Option<&str>) -> Result<i64> {
        if amount == 0 {
            return Err(LoomError::Config("grant amount must be greater than 0".into()));
        }

        let balance = self.db.transaction(|conn| {
            let now = Utc::now().to_rfc3339();
            ensure_account(conn, user, &now)?;
            conn.execute(
                "UPDATE credit_accounts SET balance = balance + ?1, updated_at = ?2 WHERE user_id = ?3",
                params![amount as i64, now, user.as_str()],
            )?;
            conn.execute(
                "INSERT INTO credit_grants (id, user_id, amount, reason, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    uuid::Uuid::new_v4().to_string(),
                    user.as_str(),
                    amount as i64,
                    reason,
                    now
                ],
            )?;
            read_balance(conn, user)
        })?;

        info!("Granted {} credits to {} (balance {})", amount, user, balance);
        Ok(balance)
    }

    /// Set a user's plan and AI entitlement.
    pub fn set_subscription(
        &self,
        user: &UserId,
        plan: &str,
        status: &str,
        can_use_ai: bool,
    ) -> Result<()> {
        self.db.transaction(|conn| {
            let now = Utc::now().to_rfc3339();
            ensure_account(conn, user, &now)?;
            conn.execute(
                "UPDATE credit_accounts SET plan = ?1, status = ?2, can_use_ai = ?3, updated_at = ?4
                 WHERE user_id = ?5",
                params![plan, status, can_use_ai, now, user.as_str()],
            )?;
            Ok(())
        })?;

        info!("Subscription for {} set to {} ({})", user, plan, status);
        Ok(())
    }

    pub fn balance(&self, user: &UserId) -> Result<i64> {
        let conn = self.db.connection()?;
        read_balance(&conn, user)
    }

    pub fn usage_history(&self, user: &UserId, limit: usize) -> Result<Vec<UsageEntry>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, feature_type, provider, model, prompt_length, total_cost, success,
                    error_message, debited, created_at
             FROM credit_usage WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )?;

        let entries = stmt
            .query_map(params![user.as_str(), limit as i64], |row| {
                Ok(UsageEntry {
                    id: row.get(0)?,
                    feature_type: row.get(1)?,
                    provider: row.get(2)?,
                    model: row.get(3)?,
                    prompt_length: row.get(4)?,
                    total_cost: row.get(5)?,
                    success: row.get(6)?,
                    error_message: row.get(7)?,
                    debited: row.get(8)?,
                    created_at: row.get(9)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context("Failed to read usage history")?;

        Ok(entries)
    }

    fn subscription_info_sync(&self, user: &UserId) -> Result<SubscriptionInfo> {
        let conn = self.db.connection()?;
        let info = conn
            .query_row(
                "SELECT plan, status, can_use_ai, balance FROM credit_accounts WHERE user_id = ?1",
                params![user.as_str()],
                |row| {
                    Ok(SubscriptionInfo {
                        plan: row.get(0)?,
                        status: row.get(1)?,
                        can_use_ai: row.get(2)?,
                        credits_remaining: Some(row.get(3)?),
                    })
                },
            )
            .optional()?;

        Ok(info.unwrap_or_else(SubscriptionInfo::none))
    }

    fn record_usage_sync(&self, record: &UsageRecord) -> Result<bool> {
        self.db.transaction(|conn| {
            let now = Utc::now().to_rfc3339();
            let debited = conn.execute(
                "UPDATE credit_accounts SET balance = balance - ?1, updated_at = ?2
                 WHERE user_id = ?3 AND balance >= ?1",
                params![record.total_cost as i64, now, record.user_id.as_str()],
            )? == 1;

            conn.execute(
                "INSERT INTO credit_usage
                 (id, user_id, feature_type, provider, model, prompt_length, base_cost,
                  multiplier, total_cost, success, error_message, debited, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    uuid::Uuid::new_v4().to_string(),
                    record.user_id.as_str(),
                    record.feature_type,
                    record.provider,
                    record.model,
                    record.prompt_length as i64,
                    record.base_cost as i64,
                    record.multiplier,
                    record.total_cost as i64,
                    record.success,
                    record.error_message,
                    debited,
                    now
                ],
            )?;

            Ok(debited)
        })
    }

    /// Run a synchronous ledger operation off the async runtime
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&LocalLedger) -> Result<T> + Send + 'static,
    {
        let ledger = self.clone();
        tokio::task::spawn_blocking(move || f(&ledger))
            .await
            .map_err(|e| LoomError::Storage(format!("Ledger task failed: {}", e)))?
    }
}

fn ensure_account(conn: &Connection, user: &UserId, now: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO credit_accounts (user_id, balance, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3)
         ON CONFLICT(user_id) DO NOTHING",
        params![user.as_str(), ledger_constants::INITIAL_BALANCE, now],
    )?;
    Ok(())
}

fn read_balance(conn: &Connection, user: &UserId) -> Result<i64> {
    let balance = conn
        .query_row(
            "SELECT balance FROM credit_accounts WHERE user_id = ?1",
            params![user.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(balance.unwrap_or(ledger_constants::INITIAL_BALANCE))
}

#[async_trait]
impl CreditLedger for LocalLedger {
    async fn subscription_info(&self, user: &UserId) -> Result<SubscriptionInfo> {
        let user = user.clone();
        self.blocking(move |ledger| ledger.subscription_info_sync(&user))
            .await
    }

    async fn has_sufficient_credits(&self, user: &UserId, required: u32) -> Result<bool> {
        let user = user.clone();
        let balance = self.blocking(move |ledger| ledger.balance(&user)).await?;
        debug!("Balance {} against required {}", balance, required);
        Ok(balance >= required as i64)
    }

    async fn record_usage(&self, record: &UsageRecord) -> Result<bool> {
        let owned = record.clone();
        let debited = self
            .blocking(move |ledger| ledger.record_usage_sync(&owned))
            .await?;

        if debited {
            info!(
                "Debited {} credits from {} (success: {})",
                record.total_cost, record.user_id, record.success
            );
        } else {
            warn!(
                "Usage of {} credits by {} recorded without debit: balance too low",
                record.total_cost, record.user_id
            );
        }
        Ok(debited)
    }
}

/// Parse a stored RFC 3339 timestamp
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::pricing::{CostBreakdown, CostCalculation};
    use crate::storage::Database;
    use std::sync::Arc;

    fn cost(total: u32) -> CostCalculation {
        CostCalculation {
            base_cost: total,
            multiplier: 1.0,
            total_cost: total,
            breakdown: CostBreakdown {
                provider: 1.0,
                model: 1.0,
                complexity: 1.0,
                length: 1.0,
            },
        }
    }

    fn record(user: &UserId, total: u32) -> UsageRecord {
        UsageRecord::new(user.clone(), "prompt_generation", "openai", "gpt-4o-mini", 120, &cost(total))
    }

    fn ledger() -> LocalLedger {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        LocalLedger::new(Arc::new(db))
    }

    #[tokio::test]
    async fn test_unknown_user_has_no_entitlement() {
        let ledger = ledger();
        let user = UserId::parse("ghost").unwrap();

        let info = ledger.subscription_info(&user).await.unwrap();
        assert!(!info.can_use_ai);
        assert!(!ledger.has_sufficient_credits(&user, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_grant_and_subscribe() {
        let ledger = ledger();
        let user = UserId::parse("u1").unwrap();

        assert_eq!(ledger.grant_credits(&user, 50, Some("welcome")).unwrap(), 50);
        assert_eq!(ledger.grant_credits(&user, 25, None).unwrap(), 75);
        ledger.set_subscription(&user, "pro", "active", true).unwrap();

        let info = ledger.subscription_info(&user).await.unwrap();
        assert_eq!(info.plan, "pro");
        assert!(info.can_use_ai);
        assert_eq!(info.credits_remaining, Some(75));

        assert!(ledger.has_sufficient_credits(&user, 75).await.unwrap());
        assert!(!ledger.has_sufficient_credits(&user, 76).await.unwrap());
    }

    #[test]
    fn test_zero_grant_rejected() {
        let user = UserId::parse("u1").unwrap();
        assert!(ledger().grant_credits(&user, 0, None).is_err());
    }

    #[tokio::test]
    async fn test_record_usage_debits_and_audits() {
        let ledger = ledger();
        let user = UserId::parse("u1").unwrap();
        ledger.grant_credits(&user, 30, None).unwrap();

        assert!(ledger.record_usage(&record(&user, 10)).await.unwrap());
        assert!(
            ledger
                .record_usage(&record(&user, 10).failed("provider timed out"))
                .await
                .unwrap()
        );
        assert_eq!(ledger.balance(&user).unwrap(), 10);

        let history = ledger.usage_history(&user, 10).unwrap();
        assert_eq!(history.len(), 2);
        assert!(!history[0].success);
        assert_eq!(history[0].error_message.as_deref(), Some("provider timed out"));
        assert!(history.iter().all(|e| e.debited));
        assert!(parse_timestamp(&history[0].created_at).is_some());
    }

    #[tokio::test]
    async fn test_debit_never_overdraws() {
        let ledger = ledger();
        let user = UserId::parse("u1").unwrap();
        ledger.grant_credits(&user, 5, None).unwrap();

        let debited = ledger.record_usage(&record(&user, 10)).await.unwrap();
        assert!(!debited);
        assert_eq!(ledger.balance(&user).unwrap(), 5);

        let history = ledger.usage_history(&user, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert!(!history[0].debited);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_debits_race_for_one_balance() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("ledger.db")).unwrap();
        db.initialize().unwrap();
        let ledger = LocalLedger::new(Arc::new(db));
        let user = UserId::parse("racer").unwrap();
        ledger.grant_credits(&user, 10, None).unwrap();

        // Both pass the check against the same balance
        assert!(ledger.has_sufficient_credits(&user, 10).await.unwrap());
        assert!(ledger.has_sufficient_credits(&user, 10).await.unwrap());

        let a = {
            let ledger = ledger.clone();
            let record = record(&user, 10);
            tokio::spawn(async move { ledger.record_usage(&record).await })
        };
        let b = {
            let ledger = ledger.clone();
            let record = record(&user, 10);
            tokio::spawn(async move { ledger.record_usage(&record).await })
        };

        let results = [a.await.unwrap().unwrap(), b.await.unwrap().unwrap()];
        assert_eq!(results.iter().filter(|d| **d).count(), 1);
        assert_eq!(ledger.balance(&user).unwrap(), 0);
        assert_eq!(ledger.usage_history(&user, 10).unwrap().len(), 2);
    }
}
