//! Generation Orchestrator
//!
//! Runs one credit-metered generation attempt:
//!
//! 1. **Authorize**: a user with an AI entitlement is required.
//! 2. **Price**: cost from the configured provider/model and the request.
//! 3. **Credit check**: balance must cover the total cost.
//! 4. **Generate**: the paid call.
//! 5. **Record**: usage is written exactly once, success or failure.
//!
//! Steps 1-3 abort without writing anything. Once step 4 starts the attempt
//! is charged whatever its outcome; a failed recording is logged and never
//! replaces the generation outcome.

use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::state::{Attempt, AttemptState};
use crate::ai::client::GenerationClient;
use crate::ai::timeout::{TimeoutConfig, guarded};
use crate::billing::{BillingIntent, CostCalculation, PricingTable, SharedLedger, UsageRecord};
use crate::config::AiSettings;
use crate::storage::PromptStore;
use crate::types::{GenerationConfig, GenerationError, GenerationResult, LoomError, Result, UserId};

/// Outcome of a successful attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPrompt {
    pub result: GenerationResult,
    pub cost: CostCalculation,
    /// Whether the ledger debited the balance
    pub debited: bool,
    /// History entry id, when a prompt store is attached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_id: Option<String>,
}

pub struct GenerationOrchestrator {
    settings: AiSettings,
    pricing: PricingTable,
    ledger: SharedLedger,
    client: GenerationClient,
    timeouts: TimeoutConfig,
    store: Option<PromptStore>,
}

impl GenerationOrchestrator {
    pub fn new(
        settings: AiSettings,
        pricing: PricingTable,
        ledger: SharedLedger,
        client: GenerationClient,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            settings,
            pricing,
            ledger,
            client,
            timeouts,
            store: None,
        }
    }

    /// Persist successful generations to prompt history
    pub fn with_store(mut self, store: PromptStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn settings(&self) -> &AiSettings {
        &self.settings
    }

    /// Price a request without side effects
    pub fn estimate(&self, config: &GenerationConfig) -> Result<CostCalculation> {
        self.pricing.calculate_cost(
            &self.settings.feature_type,
            self.settings.provider.as_str(),
            &self.settings.model,
            config.complexity,
            config.prompt_length(),
        )
    }

    /// Run one generation attempt.
    ///
    /// Cancelling `cancel` before the paid call aborts without a charge.
    /// Cancelling during the paid call fails the attempt, which is charged.
    pub async fn generate(
        &self,
        user: Option<&UserId>,
        config: &GenerationConfig,
        cancel: &CancellationToken,
    ) -> Result<GeneratedPrompt> {
        let mut attempt = Attempt::new();

        // Gates: nothing is written on any of these exits
        let (user, cost) = match self.pass_gates(&mut attempt, user, config, cancel).await {
            Ok(passed) => passed,
            Err(e) => {
                debug_assert!(!attempt.state().is_billable());
                attempt.advance(AttemptState::Terminal);
                if e.is_gate_rejection() {
                    info!(attempt = %attempt.id(), "Attempt rejected before generation: {}", e);
                } else {
                    warn!(attempt = %attempt.id(), "Attempt aborted before generation: {}", e);
                }
                return Err(e);
            }
        };

        let provider = self.settings.provider;
        let model = self.settings.model.as_str();

        let intent = BillingIntent::acquire(
            Arc::clone(&self.ledger),
            UsageRecord::new(
                user.clone(),
                &self.settings.feature_type,
                provider.as_str(),
                model,
                config.prompt_length(),
                &cost,
            ),
            self.timeouts.record_usage(),
        );

        attempt.advance(AttemptState::Generating);
        let outcome: std::result::Result<GenerationResult, GenerationError> = guarded(
            self.timeouts.generation(),
            cancel,
            async {
                self.client
                    .generate(config, provider, model)
                    .await
                    .map_err(LoomError::from)
            },
            "generation",
        )
        .await
        .map_err(|e| GenerationError::wrap(&e, provider.as_str()));

        attempt.advance(if outcome.is_ok() {
            AttemptState::Succeeded
        } else {
            AttemptState::Failed
        });

        let recorded = match &outcome {
            Ok(_) => intent.settle_success().await,
            Err(e) => intent.settle_failure(e.message.clone()).await,
        };
        attempt.advance(AttemptState::Recorded);

        let debited = match recorded {
            Ok(debited) => debited,
            Err(e) => {
                error!(
                    attempt = %attempt.id(),
                    "Failed to record usage of {} credits for {}: {}",
                    cost.total_cost, user, e
                );
                false
            }
        };
        attempt.advance(AttemptState::Terminal);

        let result = outcome?;
        let history_id = self.save_history(&user, config, &result, &cost).await;

        Ok(GeneratedPrompt {
            result,
            cost,
            debited,
            history_id,
        })
    }

    async fn pass_gates(
        &self,
        attempt: &mut Attempt,
        user: Option<&UserId>,
        config: &GenerationConfig,
        cancel: &CancellationToken,
    ) -> Result<(UserId, CostCalculation)> {
        attempt.advance(AttemptState::Authorizing);
        let user = user
            .cloned()
            .ok_or_else(|| LoomError::NotAuthorized("sign in to generate prompts".to_string()))?;

        let subscription = guarded(
            self.timeouts.authorization(),
            cancel,
            self.ledger.subscription_info(&user),
            "authorization",
        )
        .await?;
        if !subscription.can_use_ai {
            return Err(LoomError::NotAuthorized(format!(
                "plan '{}' ({}) does not include AI generation",
                subscription.plan, subscription.status
            )));
        }

        let cost = self.estimate(config)?;
        attempt.advance(AttemptState::CostComputed);

        let sufficient = guarded(
            self.timeouts.credit_check(),
            cancel,
            self.ledger.has_sufficient_credits(&user, cost.total_cost),
            "credit check",
        )
        .await?;
        if !sufficient {
            return Err(LoomError::InsufficientCredits {
                required: cost.total_cost,
            });
        }
        attempt.advance(AttemptState::CreditChecked);

        if cancel.is_cancelled() {
            return Err(LoomError::cancelled("generation"));
        }

        Ok((user, cost))
    }

    /// Store a successful generation off the async executor
    async fn save_history(
        &self,
        user: &UserId,
        config: &GenerationConfig,
        result: &GenerationResult,
        cost: &CostCalculation,
    ) -> Option<String> {
        let store = self.store.clone()?;
        let (user, config, result) = (user.clone(), config.clone(), result.clone());
        let total_cost = cost.total_cost;

        let saved = tokio::task::spawn_blocking(move || {
            store.save(&user, &config, &result, total_cost)
        })
        .await
        .map_err(|e| LoomError::Storage(format!("History task failed: {}", e)))
        .and_then(|saved| saved);

        match saved {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Failed to save prompt history: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::{
        CompletionBackend, CompletionRequest, CompletionResponse, ProviderSet, ResponseTiming,
    };
    use crate::ai::registry::ProviderId;
    use crate::billing::testing::RecordingLedger;
    use crate::storage::Database;
    use crate::types::{Complexity, ErrorCategory, StructureType};
    use async_trait::async_trait;
    use std::time::Duration;

    const STRUCTURED: &str =
        r#"{"structureType":"structured","sections":[{"title":"Role","content":"You review code."}]}"#;
    const STANDARD: &str = r#"{"structureType":"standard","segments":[{"content":"hi"}]}"#;

    struct ScriptedBackend {
        reply: &'static str,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(CompletionResponse {
                text: self.reply.to_string(),
                tokens_used: Some(250),
                timing: ResponseTiming::default(),
            })
        }

        fn provider(&self) -> ProviderId {
            ProviderId::OpenAi
        }
    }

    fn orchestrator(
        ledger: Arc<RecordingLedger>,
        reply: &'static str,
        delay: Option<Duration>,
    ) -> GenerationOrchestrator {
        let providers =
            ProviderSet::new().with_backend(Arc::new(ScriptedBackend { reply, delay }));
        GenerationOrchestrator::new(
            AiSettings::default(),
            PricingTable::default(),
            ledger,
            GenerationClient::new(providers),
            TimeoutConfig::default(),
        )
    }

    fn request() -> GenerationConfig {
        GenerationConfig::new("A prompt that reviews pull requests", StructureType::Structured)
            .with_complexity(Complexity::Simple)
    }

    fn user() -> UserId {
        UserId::parse("user-1").unwrap()
    }

    #[tokio::test]
    async fn test_missing_user_never_touches_ledger() {
        let ledger = Arc::new(RecordingLedger::new());
        let orch = orchestrator(ledger.clone(), STRUCTURED, None);

        let err = orch
            .generate(None, &request(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, LoomError::NotAuthorized(_)));
        assert_eq!(ledger.subscription_calls(), 0);
        assert_eq!(ledger.records().len(), 0);
    }

    #[tokio::test]
    async fn test_no_entitlement_is_not_recorded() {
        let ledger = Arc::new(RecordingLedger::new().without_entitlement());
        let orch = orchestrator(ledger.clone(), STRUCTURED, None);

        let err = orch
            .generate(Some(&user()), &request(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, LoomError::NotAuthorized(_)));
        assert_eq!(ledger.check_calls(), 0);
        assert_eq!(ledger.records().len(), 0);
    }

    #[tokio::test]
    async fn test_insufficient_credits_carries_total_cost() {
        let ledger = Arc::new(RecordingLedger::new().insufficient());
        let orch = orchestrator(ledger.clone(), STRUCTURED, None);
        let expected = orch.estimate(&request()).unwrap().total_cost;

        let err = orch
            .generate(Some(&user()), &request(), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            LoomError::InsufficientCredits { required } => assert_eq!(required, expected),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(ledger.records().len(), 0);
    }

    #[tokio::test]
    async fn test_failed_generation_is_recorded_once_and_propagated() {
        let ledger = Arc::new(RecordingLedger::new());
        // Standard content for a structured request
        let orch = orchestrator(ledger.clone(), STANDARD, None);

        let err = orch
            .generate(Some(&user()), &request(), &CancellationToken::new())
            .await
            .unwrap_err();

        let LoomError::Generation(gen_err) = err else {
            panic!("expected generation error, got {err:?}");
        };
        assert_eq!(gen_err.code, "GENERATION_FAILED");
        assert_eq!(gen_err.provider, "openai");

        let records = ledger.records();
        assert_eq!(records.len(), 1);
        assert!(!records[0].success);
        assert_eq!(records[0].error_message.as_deref(), Some(gen_err.message.as_str()));
    }

    #[tokio::test]
    async fn test_success_is_recorded_once() {
        let ledger = Arc::new(RecordingLedger::new());
        let orch = orchestrator(ledger.clone(), STRUCTURED, None);

        let generated = orch
            .generate(Some(&user()), &request(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(generated.debited);
        assert_eq!(generated.result.provider, "openai");
        assert_eq!(generated.result.model, "gpt-4o-mini");
        assert_eq!(generated.result.tokens_used, Some(250));
        assert_eq!(generated.cost.total_cost, 10);
        assert!(generated.history_id.is_none());

        let records = ledger.records();
        assert_eq!(records.len(), 1);
        assert!(records[0].success);
        assert_eq!(records[0].total_cost, generated.cost.total_cost);
        assert_eq!(records[0].feature_type, "prompt_generation");
    }

    #[tokio::test]
    async fn test_generation_time_excludes_gates() {
        let ledger = Arc::new(RecordingLedger::new().with_check_delay(Duration::from_millis(200)));
        let orch = orchestrator(ledger.clone(), STRUCTURED, None);

        let generated = orch
            .generate(Some(&user()), &request(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(generated.result.generation_time_ms < 200);
    }

    #[tokio::test]
    async fn test_recording_failure_does_not_mask_success() {
        let ledger = Arc::new(RecordingLedger::new().failing_record());
        let orch = orchestrator(ledger.clone(), STRUCTURED, None);

        let generated = orch
            .generate(Some(&user()), &request(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(!generated.debited);
        assert_eq!(ledger.records().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_before_generation_is_free() {
        let ledger = Arc::new(RecordingLedger::new().with_check_delay(Duration::from_secs(2)));
        let orch = orchestrator(ledger.clone(), STRUCTURED, None);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = orch
            .generate(Some(&user()), &request(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, LoomError::Cancelled { .. }));
        assert_eq!(ledger.records().len(), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_generation_is_charged() {
        let ledger = Arc::new(RecordingLedger::new());
        let orch = orchestrator(ledger.clone(), STRUCTURED, Some(Duration::from_secs(2)));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = orch
            .generate(Some(&user()), &request(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LoomError::Generation(GenerationError { category: ErrorCategory::Cancelled, .. })
        ));
        let records = ledger.records();
        assert_eq!(records.len(), 1);
        assert!(!records[0].success);
    }

    #[tokio::test]
    async fn test_dropped_attempt_is_still_recorded() {
        let ledger = Arc::new(RecordingLedger::new());
        let orch = orchestrator(ledger.clone(), STRUCTURED, Some(Duration::from_secs(2)));
        let config = request();
        let cancel = CancellationToken::new();
        let u = user();

        let dropped = tokio::time::timeout(
            Duration::from_millis(50),
            orch.generate(Some(&u), &config, &cancel),
        )
        .await;
        assert!(dropped.is_err());

        ledger.wait_for_records(1).await;
        let records = ledger.records();
        assert_eq!(records.len(), 1);
        assert!(!records[0].success);
    }

    #[tokio::test]
    async fn test_history_saved_on_success() {
        let ledger = Arc::new(RecordingLedger::new());
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let store = PromptStore::new(Arc::new(db));
        let orch = orchestrator(ledger, STRUCTURED, None).with_store(store.clone());

        let generated = orch
            .generate(Some(&user()), &request(), &CancellationToken::new())
            .await
            .unwrap();

        let id = generated.history_id.expect("history id");
        let stored = store.get(&user(), &id).unwrap();
        assert_eq!(stored.result, generated.result);
        assert_eq!(stored.config, request());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_history_saved_from_worker_runtime() {
        let ledger = Arc::new(RecordingLedger::new());
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let store = PromptStore::new(Arc::new(db));
        let orch = orchestrator(ledger, STRUCTURED, None).with_store(store.clone());

        for _ in 0..3 {
            orch.generate(Some(&user()), &request(), &CancellationToken::new())
                .await
                .unwrap();
        }
        assert_eq!(store.list(&user(), 10).unwrap().len(), 3);
    }
}
