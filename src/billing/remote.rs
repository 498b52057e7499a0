//! RPC Credit Ledger
//!
//! Ledger hosted behind a PostgREST-style RPC endpoint:
//!
//! | Operation | Endpoint |
//! |---|---|
//! | subscription info | `POST {url}/rpc/get_subscription_info` |
//! | balance check | `POST {url}/rpc/check_credits` |
//! | usage + debit | `POST {url}/rpc/deduct_credits` |
//!
//! Parameters are sent as a JSON object with `p_`-prefixed names. Failures
//! are returned as `LoomError::Ledger`; nothing is retried.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::ledger::{CreditLedger, SubscriptionInfo, UsageRecord};
use crate::constants::network;
use crate::types::{LoomError, Result, UserId};

pub struct RemoteLedger {
    base_url: Url,
    api_key: Option<SecretString>,
    client: reqwest::Client,
}

impl std::fmt::Debug for RemoteLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteLedger")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl RemoteLedger {
    pub fn new(base_url: &str, api_key: Option<String>, timeout_secs: u64) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| LoomError::Config(format!("Invalid ledger URL '{}': {}", base_url, e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(network::CONNECTION_TIMEOUT_SECS))
            .build()
            .map_err(|e| LoomError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            api_key: api_key
                .filter(|k| !k.trim().is_empty())
                .map(SecretString::from),
            client,
        })
    }

    async fn rpc<T, B>(&self, function: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}/rpc/{}", self.base_url.as_str().trim_end_matches('/'), function);
        debug!("Ledger RPC {}", function);

        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request
                .header("apikey", key.expose_secret())
                .bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| LoomError::Ledger(format!("{} request failed: {}", function, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LoomError::Ledger(format!(
                "{} returned {}: {}",
                function, status, text
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| LoomError::Ledger(format!("{} returned an invalid body: {}", function, e)))
    }
}

#[async_trait]
impl CreditLedger for RemoteLedger {
    async fn subscription_info(&self, user: &UserId) -> Result<SubscriptionInfo> {
        let value: Value = self
            .rpc("get_subscription_info", &json!({ "p_user_id": user.as_str() }))
            .await?;

        // Set-returning functions answer with an array of rows
        let row = match value {
            Value::Array(rows) => match rows.into_iter().next() {
                Some(row) => row,
                None => return Ok(SubscriptionInfo::none()),
            },
            Value::Null => return Ok(SubscriptionInfo::none()),
            other => other,
        };

        serde_json::from_value(row).map_err(|e| {
            LoomError::Ledger(format!("get_subscription_info returned an invalid row: {}", e))
        })
    }

    async fn has_sufficient_credits(&self, user: &UserId, required: u32) -> Result<bool> {
        self.rpc(
            "check_credits",
            &json!({
                "p_user_id": user.as_str(),
                "p_required_credits": required,
            }),
        )
        .await
    }

    async fn record_usage(&self, record: &UsageRecord) -> Result<bool> {
        let debited: bool = self
            .rpc(
                "deduct_credits",
                &json!({
                    "p_user_id": record.user_id.as_str(),
                    "p_feature_type": record.feature_type,
                    "p_provider": record.provider,
                    "p_model": record.model,
                    "p_prompt_length": record.prompt_length,
                    "p_base_cost": record.base_cost,
                    "p_multiplier": record.multiplier,
                    "p_total_cost": record.total_cost,
                    "p_success": record.success,
                    "p_error_message": record.error_message,
                }),
            )
            .await?;

        info!(
            "Recorded {} credits for {} (success: {}, debited: {})",
            record.total_cost, record.user_id, record.success, debited
        );
        Ok(debited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::pricing::{CostBreakdown, CostCalculation};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ledger(server: &MockServer) -> RemoteLedger {
        RemoteLedger::new(&server.uri(), Some("anon-key".into()), 5).unwrap()
    }

    fn user() -> UserId {
        UserId::parse("user-42").unwrap()
    }

    #[tokio::test]
    async fn test_check_credits_sends_prefixed_params() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc/check_credits"))
            .and(header("apikey", "anon-key"))
            .and(header("authorization", "Bearer anon-key"))
            .and(body_partial_json(json!({
                "p_user_id": "user-42",
                "p_required_credits": 15
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
            .expect(1)
            .mount(&server)
            .await;

        assert!(ledger(&server).has_sufficient_credits(&user(), 15).await.unwrap());
    }

    #[tokio::test]
    async fn test_deduct_credits_records_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc/deduct_credits"))
            .and(body_partial_json(json!({
                "p_total_cost": 12,
                "p_success": false,
                "p_error_message": "bad json"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
            .expect(1)
            .mount(&server)
            .await;

        let cost = CostCalculation {
            base_cost: 10,
            multiplier: 1.2,
            total_cost: 12,
            breakdown: CostBreakdown {
                provider: 1.0,
                model: 1.0,
                complexity: 1.0,
                length: 1.2,
            },
        };
        let record = UsageRecord::new(user(), "prompt_generation", "openai", "gpt-4o-mini", 700, &cost)
            .failed("bad json");

        assert!(ledger(&server).record_usage(&record).await.unwrap());
    }

    #[tokio::test]
    async fn test_subscription_info_accepts_row_array() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc/get_subscription_info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "plan": "pro",
                "status": "active",
                "can_use_ai": true,
                "credits_remaining": 120
            }])))
            .mount(&server)
            .await;

        let info = ledger(&server).subscription_info(&user()).await.unwrap();
        assert!(info.can_use_ai);
        assert_eq!(info.credits_remaining, Some(120));
    }

    #[tokio::test]
    async fn test_empty_subscription_means_no_entitlement() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc/get_subscription_info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let info = ledger(&server).subscription_info(&user()).await.unwrap();
        assert!(!info.can_use_ai);
    }

    #[tokio::test]
    async fn test_server_error_is_ledger_error_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc/check_credits"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .expect(1)
            .mount(&server)
            .await;

        let err = ledger(&server)
            .has_sufficient_credits(&user(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, LoomError::Ledger(msg) if msg.contains("503")));
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(RemoteLedger::new("not a url", None, 5).is_err());
    }
}
