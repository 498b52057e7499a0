//! Credit Ledger Gateway
//!
//! The ledger is the system of record for balances. `record_usage` is both the
//! audit entry and the debit; the orchestrator calls it exactly once per
//! attempt that reached the paid generation call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::pricing::CostCalculation;
use crate::types::{Result, UserId};

/// Entitlement snapshot for a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub plan: String,
    pub status: String,
    pub can_use_ai: bool,
    #[serde(default)]
    pub credits_remaining: Option<i64>,
}

impl SubscriptionInfo {
    /// No subscription on record
    pub fn none() -> Self {
        Self {
            plan: "free".to_string(),
            status: "inactive".to_string(),
            can_use_ai: false,
            credits_remaining: None,
        }
    }
}

/// One attempt's ledger entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageRecord {
    pub user_id: UserId,
    pub feature_type: String,
    pub provider: String,
    pub model: String,
    pub prompt_length: usize,
    pub base_cost: u32,
    pub multiplier: f64,
    pub total_cost: u32,
    pub success: bool,
    pub error_message: Option<String>,
}

impl UsageRecord {
    /// Entry for a priced attempt; outcome defaults to success
    pub fn new(
        user_id: UserId,
        feature_type: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
        prompt_length: usize,
        cost: &CostCalculation,
    ) -> Self {
        Self {
            user_id,
            feature_type: feature_type.into(),
            provider: provider.into(),
            model: model.into(),
            prompt_length,
            base_cost: cost.base_cost,
            multiplier: cost.multiplier,
            total_cost: cost.total_cost,
            success: true,
            error_message: None,
        }
    }

    pub fn failed(mut self, message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(message.into());
        self
    }
}

/// Remote or local credit ledger.
///
/// Implementations perform no retries; transport failures are returned as-is.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    async fn subscription_info(&self, user: &UserId) -> Result<SubscriptionInfo>;

    async fn has_sufficient_credits(&self, user: &UserId, required: u32) -> Result<bool>;

    /// Write the usage entry and debit the balance.
    ///
    /// Returns whether the balance was actually debited.
    async fn record_usage(&self, record: &UsageRecord) -> Result<bool>;
}

pub type SharedLedger = Arc<dyn CreditLedger>;
