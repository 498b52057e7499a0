//! Provider Registry
//!
//! Static metadata for the supported completion providers and their models.

use serde::{Deserialize, Serialize};

use crate::types::{LoomError, Result};

/// Supported completion providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
}

impl ProviderId {
    pub const ALL: [ProviderId; 2] = [ProviderId::OpenAi, ProviderId::Anthropic];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "openai",
            ProviderId::Anthropic => "anthropic",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderId {
    type Err = LoomError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderId::OpenAi),
            "anthropic" => Ok(ProviderId::Anthropic),
            _ => Err(LoomError::Config(format!(
                "Unknown provider: {}. Supported: openai, anthropic",
                s
            ))),
        }
    }
}

/// Model metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: &'static str,
    pub display_name: &'static str,
    pub context_window: u32,
    pub max_output_tokens: u32,
}

/// Provider metadata
#[derive(Debug, Clone, Copy)]
pub struct ProviderInfo {
    pub id: ProviderId,
    pub display_name: &'static str,
    /// Environment variable holding the API credential
    pub credential_env: &'static str,
    pub default_api_base: &'static str,
    pub default_model: &'static str,
    pub models: &'static [ModelInfo],
}

const OPENAI_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "gpt-4o-mini",
        display_name: "GPT-4o mini",
        context_window: 128_000,
        max_output_tokens: 16_384,
    },
    ModelInfo {
        id: "gpt-4o",
        display_name: "GPT-4o",
        context_window: 128_000,
        max_output_tokens: 16_384,
    },
    ModelInfo {
        id: "gpt-4-turbo",
        display_name: "GPT-4 Turbo",
        context_window: 128_000,
        max_output_tokens: 4_096,
    },
    ModelInfo {
        id: "gpt-3.5-turbo",
        display_name: "GPT-3.5 Turbo",
        context_window: 16_385,
        max_output_tokens: 4_096,
    },
];

const ANTHROPIC_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "claude-3-5-haiku-latest",
        display_name: "Claude 3.5 Haiku",
        context_window: 200_000,
        max_output_tokens: 8_192,
    },
    ModelInfo {
        id: "claude-sonnet-4-20250514",
        display_name: "Claude Sonnet 4",
        context_window: 200_000,
        max_output_tokens: 64_000,
    },
    ModelInfo {
        id: "claude-3-haiku-20240307",
        display_name: "Claude 3 Haiku",
        context_window: 200_000,
        max_output_tokens: 1_024,
    },
];

static PROVIDERS: [ProviderInfo; 2] = [
    ProviderInfo {
        id: ProviderId::OpenAi,
        display_name: "OpenAI",
        credential_env: "OPENAI_API_KEY",
        default_api_base: "https://api.openai.com/v1",
        default_model: "gpt-4o-mini",
        models: OPENAI_MODELS,
    },
    ProviderInfo {
        id: ProviderId::Anthropic,
        display_name: "Anthropic",
        credential_env: "ANTHROPIC_API_KEY",
        default_api_base: "https://api.anthropic.com/v1",
        default_model: "claude-3-5-haiku-latest",
        models: ANTHROPIC_MODELS,
    },
];

pub fn all_providers() -> &'static [ProviderInfo] {
    &PROVIDERS
}

pub fn provider_info(id: ProviderId) -> &'static ProviderInfo {
    match id {
        ProviderId::OpenAi => &PROVIDERS[0],
        ProviderId::Anthropic => &PROVIDERS[1],
    }
}

pub fn find_model(provider: ProviderId, model: &str) -> Option<&'static ModelInfo> {
    provider_info(provider).models.iter().find(|m| m.id == model)
}

/// Clamp an output budget to the model's documented maximum.
///
/// Unknown models keep the requested budget.
pub fn effective_max_tokens(provider: ProviderId, model: &str, requested: u32) -> u32 {
    find_model(provider, model)
        .map(|m| requested.min(m.max_output_tokens))
        .unwrap_or(requested)
}
