//! Completion Backend Abstraction
//!
//! Defines the `CompletionBackend` trait implemented by each remote
//! text-generation API, and `ProviderSet`, the capability map built once at
//! startup from validated credentials.
//!
//! A provider without a credential has no backend in the set. Asking for it
//! fails immediately; there is no fallback to another provider.

mod anthropic;
mod openai;

pub use anthropic::AnthropicBackend;
pub use openai::OpenAiBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::ai::registry::{ProviderId, provider_info};
use crate::constants::network;
use crate::types::{ErrorCategory, GenerationError, Result};

// =============================================================================
// Request / Response
// =============================================================================

/// One completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Raw completion output before structure parsing
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    /// Text payload returned by the model
    pub text: String,
    /// Total tokens, when the backend reports usage
    pub tokens_used: Option<u32>,
    /// Response timing
    pub timing: ResponseTiming,
}

/// Response timing metrics
#[derive(Debug, Clone, Default)]
pub struct ResponseTiming {
    /// Total response time in milliseconds (wall clock)
    pub total_ms: u64,
}

impl ResponseTiming {
    pub fn from_duration(duration: Duration) -> Self {
        Self {
            total_ms: duration.as_millis() as u64,
        }
    }
}

/// Shared backend type for concurrent access.
pub type SharedBackend = Arc<dyn CompletionBackend>;

// =============================================================================
// Provider Configuration
// =============================================================================

/// Configuration for one completion provider
///
/// Note: API keys are never serialized to output and are redacted in debug
/// output. Each backend converts the key to `SecretString` internally.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key (falls back to the provider's environment variable)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// API base URL (for proxies and custom endpoints)
    pub api_base: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: None,
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ProviderConfig {
    /// Resolve the credential from config, then from the provider's env var.
    /// Blank values count as absent.
    pub fn resolve_api_key(&self, id: ProviderId) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(provider_info(id).credential_env).ok())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn api_base_or_default(&self, id: ProviderId) -> String {
        self.api_base
            .clone()
            .unwrap_or_else(|| provider_info(id).default_api_base.to_string())
            .trim_end_matches('/')
            .to_string()
    }
}

/// Per-provider configuration table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: ProviderConfig,
    pub anthropic: ProviderConfig,
}

impl ProvidersConfig {
    pub fn get(&self, id: ProviderId) -> &ProviderConfig {
        match id {
            ProviderId::OpenAi => &self.openai,
            ProviderId::Anthropic => &self.anthropic,
        }
    }
}

// =============================================================================
// Completion Backend Trait
// =============================================================================

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send one completion request and return the raw text payload
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;

    /// Provider this backend talks to
    fn provider(&self) -> ProviderId;
}

// =============================================================================
// Provider Set
// =============================================================================

/// Capability map `{provider -> backend}`; absent entries mean "not configured"
#[derive(Clone, Default)]
pub struct ProviderSet {
    backends: BTreeMap<ProviderId, SharedBackend>,
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSet")
            .field("available", &self.available())
            .finish()
    }
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build backends for every provider with a credential
    pub fn from_config(config: &ProvidersConfig) -> Result<Self> {
        let mut set = Self::new();

        for id in ProviderId::ALL {
            let provider_config = config.get(id);
            let Some(api_key) = provider_config.resolve_api_key(id) else {
                debug!("No credential for {}, backend disabled", id);
                continue;
            };

            let backend: SharedBackend = match id {
                ProviderId::OpenAi => Arc::new(OpenAiBackend::new(api_key, provider_config)?),
                ProviderId::Anthropic => {
                    Arc::new(AnthropicBackend::new(api_key, provider_config)?)
                }
            };
            info!("Configured {} completion backend", id);
            set.backends.insert(id, backend);
        }

        Ok(set)
    }

    /// Register a backend under its own provider id
    pub fn with_backend(mut self, backend: SharedBackend) -> Self {
        self.backends.insert(backend.provider(), backend);
        self
    }

    pub fn is_available(&self, id: ProviderId) -> bool {
        self.backends.contains_key(&id)
    }

    pub fn available(&self) -> Vec<ProviderId> {
        self.backends.keys().copied().collect()
    }

    /// Look up a backend, failing when the provider has no credential
    pub fn get(&self, id: ProviderId) -> std::result::Result<&SharedBackend, GenerationError> {
        self.backends.get(&id).ok_or_else(|| {
            GenerationError::new(
                ErrorCategory::Unavailable,
                format!(
                    "{} is not configured. Set {} or providers.{}.api_key",
                    provider_info(id).display_name,
                    provider_info(id).credential_env,
                    id
                ),
                id.as_str(),
            )
        })
    }
}

/// Build the shared HTTP client used by a backend
pub(crate) fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(network::CONNECTION_TIMEOUT_SECS))
        .build()
        .map_err(|e| crate::types::LoomError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Strip a surrounding markdown code fence (```json ... ```), if present.
///
/// No other repair is attempted: malformed JSON is a terminal failure.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let start = trimmed.find('\n').map(|i| i + 1).unwrap_or(trimmed.len());
    let end = trimmed[start..]
        .rfind("```")
        .map(|i| i + start)
        .unwrap_or(trimmed.len());
    trimmed[start..end].trim()
}
