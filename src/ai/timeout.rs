//! Remote Call Timeouts and Cancellation
//!
//! Every remote call in a generation attempt gets its own deadline, and all
//! of them except the billing finalizer observe the attempt's cancellation
//! token.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::ai::timeout::{TimeoutConfig, guarded};
//!
//! let config = TimeoutConfig::default();
//! let allowed = guarded(
//!     config.credit_check(),
//!     &cancel,
//!     ledger.has_sufficient_credits(&user, cost),
//!     "credit check",
//! ).await?;
//! ```

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::constants::network as net_constants;
use crate::types::{LoomError, Result};

/// Per-call timeouts for one generation attempt (seconds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Subscription/entitlement lookup
    pub authorization_secs: u64,
    /// Balance check
    pub credit_check_secs: u64,
    /// Completion call including response parsing
    pub generation_secs: u64,
    /// Usage recording (the billing finalizer)
    pub record_usage_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            authorization_secs: net_constants::LEDGER_TIMEOUT_SECS,
            credit_check_secs: net_constants::LEDGER_TIMEOUT_SECS,
            generation_secs: net_constants::DEFAULT_TIMEOUT_SECS,
            record_usage_secs: net_constants::LEDGER_TIMEOUT_SECS,
        }
    }
}

impl TimeoutConfig {
    pub fn authorization(&self) -> Duration {
        Duration::from_secs(self.authorization_secs)
    }

    pub fn credit_check(&self) -> Duration {
        Duration::from_secs(self.credit_check_secs)
    }

    pub fn generation(&self) -> Duration {
        Duration::from_secs(self.generation_secs)
    }

    pub fn record_usage(&self) -> Duration {
        Duration::from_secs(self.record_usage_secs)
    }

    pub fn validate(&self) -> Result<()> {
        let all = [
            ("authorization_secs", self.authorization_secs),
            ("credit_check_secs", self.credit_check_secs),
            ("generation_secs", self.generation_secs),
            ("record_usage_secs", self.record_usage_secs),
        ];
        if let Some((name, _)) = all.iter().find(|(_, secs)| *secs == 0) {
            return Err(LoomError::Config(format!(
                "timeouts.{} must be greater than 0",
                name
            )));
        }
        Ok(())
    }
}

/// Execute an async operation with a timeout
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(LoomError::timeout(operation_name, timeout)),
    }
}

/// Execute an async operation with a timeout, aborting early on cancellation
pub async fn guarded<T, F>(
    timeout: Duration,
    cancel: &CancellationToken,
    future: F,
    operation_name: &str,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(LoomError::cancelled(operation_name));
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LoomError::cancelled(operation_name)),
        result = with_timeout(timeout, future, operation_name) => result,
    }
}
