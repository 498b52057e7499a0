//! Billing Intent
//!
//! Acquired once an attempt passes the credit gate. It must be settled
//! exactly once, as success or failure, and settling consumes it. An intent
//! dropped unsettled (the attempt's future was dropped mid-generation)
//! records a failure from its `Drop` on the ambient tokio runtime, so the
//! paid call is always accounted for.

use std::time::Duration;
use tracing::{error, warn};

use super::ledger::{SharedLedger, UsageRecord};
use crate::ai::timeout::with_timeout;
use crate::types::Result;

const ABANDONED_MESSAGE: &str = "generation abandoned before completion";

pub struct BillingIntent {
    ledger: SharedLedger,
    record: Option<UsageRecord>,
    timeout: Duration,
}

impl std::fmt::Debug for BillingIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingIntent")
            .field("record", &self.record)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl BillingIntent {
    pub fn acquire(ledger: SharedLedger, record: UsageRecord, timeout: Duration) -> Self {
        Self {
            ledger,
            record: Some(record),
            timeout,
        }
    }

    /// Record a successful attempt. Returns whether the balance was debited.
    pub async fn settle_success(mut self) -> Result<bool> {
        match self.record.take() {
            Some(record) => self.write(record).await,
            None => Ok(false),
        }
    }

    /// Record a failed attempt with its error message.
    pub async fn settle_failure(mut self, message: impl Into<String>) -> Result<bool> {
        match self.record.take() {
            Some(record) => self.write(record.failed(message)).await,
            None => Ok(false),
        }
    }

    /// Bounded by the timeout but never cancelled: once started, the write
    /// runs to completion or deadline.
    async fn write(&self, record: UsageRecord) -> Result<bool> {
        with_timeout(
            self.timeout,
            self.ledger.record_usage(&record),
            "record usage",
        )
        .await
    }
}

impl Drop for BillingIntent {
    fn drop(&mut self) {
        let Some(record) = self.record.take() else {
            return;
        };

        let record = record.failed(ABANDONED_MESSAGE);
        warn!(
            "Billing intent for {} dropped unsettled, recording failure",
            record.user_id
        );

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let ledger = self.ledger.clone();
                let timeout = self.timeout;
                handle.spawn(async move {
                    let outcome =
                        with_timeout(timeout, ledger.record_usage(&record), "record usage").await;
                    if let Err(e) = outcome {
                        error!("Failed to record abandoned attempt for {}: {}", record.user_id, e);
                    }
                });
            }
            Err(_) => {
                error!(
                    "No async runtime to record abandoned attempt for {} ({} credits)",
                    record.user_id, record.total_cost
                );
            }
        }
    }
}
