//! Anthropic Completion Backend
//!
//! Messages API. Usage is reported as separate input/output counts, which
//! are summed into the total.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use super::{
    CompletionBackend, CompletionRequest, CompletionResponse, ProviderConfig, ResponseTiming,
    build_http_client,
};
use crate::ai::registry::ProviderId;
use crate::types::{ErrorCategory, ErrorClassifier, GenerationError, Result};

const PROVIDER: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";

/// Anthropic backend with secure API key handling
pub struct AnthropicBackend {
    api_key: SecretString,
    api_base: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicBackend")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl AnthropicBackend {
    pub fn new(api_key: String, config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            api_key: SecretString::from(api_key),
            api_base: config.api_base_or_default(ProviderId::Anthropic),
            client: build_http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl CompletionBackend for AnthropicBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        info!(
            "Generating with Anthropic (model: {}, max_tokens: {})",
            request.model, request.max_tokens
        );

        let start_time = Instant::now();
        let body = MessagesRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: request.user.clone(),
            }],
        };

        let response = self
            .client
            .post(format!("{}/messages", self.api_base))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                ErrorClassifier::classify(&format!("Anthropic request failed: {}", e), PROVIDER)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ErrorClassifier::classify_http_status(
                status.as_u16(),
                &format!("Anthropic API error ({}): {}", status, error_text),
                PROVIDER,
            )
            .into());
        }

        let response_body: MessagesResponse = response.json().await.map_err(|e| {
            GenerationError::new(
                ErrorCategory::ParseError,
                format!("Failed to parse Anthropic response: {}", e),
                PROVIDER,
            )
        })?;

        let elapsed = start_time.elapsed();

        let text = response_body
            .content
            .into_iter()
            .find_map(|block| (block.block_type == "text").then_some(block.text).flatten())
            .ok_or_else(|| {
                GenerationError::new(
                    ErrorCategory::ParseError,
                    "No text content in Anthropic response",
                    PROVIDER,
                )
            })?;

        debug!("Received {} chars from Anthropic", text.len());

        Ok(CompletionResponse {
            text,
            tokens_used: response_body
                .usage
                .map(|u| u.input_tokens + u.output_tokens),
            timing: ResponseTiming::from_duration(elapsed),
        })
    }

    fn provider(&self) -> ProviderId {
        ProviderId::Anthropic
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LoomError;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> AnthropicBackend {
        let config = ProviderConfig {
            api_base: Some(server.uri()),
            ..Default::default()
        };
        AnthropicBackend::new("sk-ant-test".to_string(), &config).unwrap()
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "claude-3-5-haiku-latest".into(),
            system: "be a prompt engineer".into(),
            user: "write a prompt".into(),
            temperature: 0.7,
            max_tokens: 2048,
        }
    }

    #[tokio::test]
    async fn test_complete_sums_input_and_output_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "sk-ant-test"))
            .and(header("anthropic-version", "2023-06-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_1",
                "content": [{"type": "text", "text": "{\"structureType\":\"standard\"}"}],
                "usage": {"input_tokens": 300, "output_tokens": 45}
            })))
            .mount(&server)
            .await;

        let response = backend(&server).complete(&request()).await.unwrap();
        assert_eq!(response.tokens_used, Some(345));
        assert_eq!(response.text, "{\"structureType\":\"standard\"}");

        let received = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(body["system"], "be a prompt engineer");
        assert_eq!(body["messages"][0]["content"], "write a prompt");
        assert_eq!(body["max_tokens"], 2048);
    }

    #[tokio::test]
    async fn test_overloaded_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = backend(&server).complete(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            LoomError::Generation(GenerationError { category: ErrorCategory::Transient, .. })
        ));
    }
}
