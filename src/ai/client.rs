//! Generation Client
//!
//! Turns a [`GenerationConfig`] into structured prompt content using one of
//! the configured completion backends.

use std::time::Instant;
use tracing::{debug, info, warn};

use crate::ai::prompt::PromptTemplates;
use crate::ai::provider::{CompletionRequest, ProviderSet, strip_code_fence};
use crate::ai::registry::{ProviderId, effective_max_tokens};
use crate::constants::generation as gen_constants;
use crate::types::{GenerationConfig, GenerationError, GenerationResult, PromptContent, Result};

/// Generation client over the provider capability map
#[derive(Debug, Clone)]
pub struct GenerationClient {
    providers: ProviderSet,
    max_tokens: u32,
}

impl GenerationClient {
    pub fn new(providers: ProviderSet) -> Self {
        Self {
            providers,
            max_tokens: gen_constants::MAX_OUTPUT_TOKENS,
        }
    }

    /// Cap on output tokens, clamped per model at request time
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn providers(&self) -> &ProviderSet {
        &self.providers
    }

    /// Generate content for `config` with the given provider and model.
    ///
    /// Any failure, including a missing credential or a response of the wrong
    /// shape, becomes a `GenerationError` tagged with the provider.
    pub async fn generate(
        &self,
        config: &GenerationConfig,
        provider: ProviderId,
        model: &str,
    ) -> std::result::Result<GenerationResult, GenerationError> {
        let backend = self.providers.get(provider)?;

        let rendered = PromptTemplates::generation(config);
        let request = CompletionRequest {
            model: model.to_string(),
            system: rendered.system,
            user: rendered.user,
            temperature: gen_constants::TEMPERATURE,
            max_tokens: effective_max_tokens(provider, model, self.max_tokens),
        };

        info!(
            "Generating {} prompt with {}/{}",
            config.structure_type, provider, model
        );

        let start = Instant::now();
        let outcome = async {
            let response = backend.complete(&request).await?;
            debug!("{} responded in {}ms", provider, response.timing.total_ms);
            let content = parse_content(&response.text, config)?;
            Ok::<_, crate::types::LoomError>((content, response.tokens_used))
        }
        .await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok((content, tokens_used)) => {
                debug!(
                    "Generation finished in {}ms ({} tokens)",
                    elapsed_ms,
                    tokens_used.map_or_else(|| "unknown".to_string(), |t| t.to_string())
                );
                Ok(GenerationResult {
                    content,
                    provider: provider.to_string(),
                    model: model.to_string(),
                    tokens_used,
                    generation_time_ms: elapsed_ms,
                })
            }
            Err(e) => {
                let err = GenerationError::wrap(&e, provider.as_str());
                warn!("Generation failed after {}ms: {}", elapsed_ms, err);
                Err(err)
            }
        }
    }
}

fn parse_content(text: &str, config: &GenerationConfig) -> Result<PromptContent> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fence(text))?;
    PromptContent::parse_expected(value, config.structure_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::{CompletionBackend, CompletionResponse, ResponseTiming};
    use crate::types::{ErrorCategory, LoomError, StructureType};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct FakeBackend {
        id: ProviderId,
        reply: std::result::Result<String, GenerationError>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl FakeBackend {
        fn replying(id: ProviderId, text: &str) -> Arc<Self> {
            Arc::new(Self {
                id,
                reply: Ok(text.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(id: ProviderId, err: GenerationError) -> Arc<Self> {
            Arc::new(Self {
                id,
                reply: Err(err),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionBackend for FakeBackend {
        async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
            self.seen.lock().unwrap().push(request.clone());
            match &self.reply {
                Ok(text) => Ok(CompletionResponse {
                    text: text.clone(),
                    tokens_used: Some(99),
                    timing: ResponseTiming::default(),
                }),
                Err(e) => Err(LoomError::Generation(e.clone())),
            }
        }

        fn provider(&self) -> ProviderId {
            self.id
        }
    }

    fn client_with(backend: Arc<FakeBackend>) -> GenerationClient {
        GenerationClient::new(ProviderSet::new().with_backend(backend))
    }

    const STRUCTURED: &str = r#"{"structureType":"structured","sections":[{"title":"Role","content":"You review code."}]}"#;

    #[tokio::test]
    async fn test_generate_parses_requested_shape() {
        let backend = FakeBackend::replying(ProviderId::OpenAi, STRUCTURED);
        let client = client_with(backend.clone());
        let config = GenerationConfig::new("code reviewer", StructureType::Structured);

        let result = client
            .generate(&config, ProviderId::OpenAi, "gpt-4o-mini")
            .await
            .unwrap();

        assert_eq!(result.content.structure_type(), StructureType::Structured);
        assert_eq!(result.provider, "openai");
        assert_eq!(result.model, "gpt-4o-mini");
        assert_eq!(result.tokens_used, Some(99));

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].max_tokens, 2048);
        assert!((seen[0].temperature - 0.7).abs() < f32::EPSILON);
        assert!(seen[0].user.contains("code reviewer"));
    }

    #[tokio::test]
    async fn test_max_tokens_override_keeps_fixed_temperature() {
        let backend = FakeBackend::replying(ProviderId::OpenAi, STRUCTURED);
        let client = client_with(backend.clone()).with_max_tokens(512);
        let config = GenerationConfig::new("code reviewer", StructureType::Structured);

        client
            .generate(&config, ProviderId::OpenAi, "gpt-4o-mini")
            .await
            .unwrap();

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].max_tokens, 512);
        assert!((seen[0].temperature - gen_constants::TEMPERATURE).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_generate_accepts_fenced_json() {
        let fenced = format!("```json\n{}\n```", STRUCTURED);
        let client = client_with(FakeBackend::replying(ProviderId::Anthropic, &fenced));
        let config = GenerationConfig::new("code reviewer", StructureType::Structured);

        let result = client
            .generate(&config, ProviderId::Anthropic, "claude-3-5-haiku-latest")
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_tag_mismatch_is_generation_failure() {
        let standard = r#"{"structureType":"standard","segments":[{"content":"hi"}]}"#;
        let client = client_with(FakeBackend::replying(ProviderId::OpenAi, standard));
        let config = GenerationConfig::new("code reviewer", StructureType::Structured);

        let err = client
            .generate(&config, ProviderId::OpenAi, "gpt-4o-mini")
            .await
            .unwrap_err();
        assert_eq!(err.code, "GENERATION_FAILED");
        assert_eq!(err.category, ErrorCategory::ParseError);
        assert!(err.message.contains("expected structured, got standard"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_not_repaired() {
        let client = client_with(FakeBackend::replying(
            ProviderId::OpenAi,
            r#"{"structureType":"standard","segments":[{"content":"hi"}"#,
        ));
        let config = GenerationConfig::new("x", StructureType::Standard);

        let err = client
            .generate(&config, ProviderId::OpenAi, "gpt-4o-mini")
            .await
            .unwrap_err();
        assert_eq!(err.category, ErrorCategory::ParseError);
        assert_eq!(err.provider, "openai");
    }

    #[tokio::test]
    async fn test_missing_credential_fails_without_fallback() {
        let client = client_with(FakeBackend::replying(ProviderId::OpenAi, STRUCTURED));
        let config = GenerationConfig::new("x", StructureType::Structured);

        let err = client
            .generate(&config, ProviderId::Anthropic, "claude-3-5-haiku-latest")
            .await
            .unwrap_err();
        assert_eq!(err.category, ErrorCategory::Unavailable);
        assert_eq!(err.provider, "anthropic");
    }

    #[tokio::test]
    async fn test_backend_error_keeps_category() {
        let client = client_with(FakeBackend::failing(
            ProviderId::Anthropic,
            GenerationError::new(ErrorCategory::RateLimit, "slow down", "anthropic"),
        ));
        let config = GenerationConfig::new("x", StructureType::Standard);

        let err = client
            .generate(&config, ProviderId::Anthropic, "claude-3-5-haiku-latest")
            .await
            .unwrap_err();
        assert_eq!(err.category, ErrorCategory::RateLimit);
        assert_eq!(err.message, "slow down");
    }
}
